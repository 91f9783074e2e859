use crate::scene::SceneGraph;

/// Draws the scene through its active camera
pub trait SceneRenderer {
    /// Render one frame; an empty or partially loaded graph is valid input
    fn render(&mut self, scene: &SceneGraph) -> anyhow::Result<()>;
}

impl<R: SceneRenderer + ?Sized> SceneRenderer for &mut R {
    fn render(&mut self, scene: &SceneGraph) -> anyhow::Result<()> {
        (**self).render(scene)
    }
}
