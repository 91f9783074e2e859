use crate::math::{Axis, Color};
use crate::scene::{NodeId, SceneGraph};

/// Live scene field a control writes through to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    LightPosition { light: NodeId, axis: Axis },
    LightIntensity { light: NodeId },
    /// Writes the light's color; reads back the control's own palette value
    LightColor { light: NodeId },
    SpinRate { axis: Axis },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Number(f32),
    Color(Color),
}

#[derive(Debug, Clone)]
pub struct Field {
    pub label: String,
    pub binding: Binding,
    /// Drag speed of the numeric control
    pub speed: f64,
    palette: Option<Color>,
}

#[derive(Debug, Clone)]
pub struct Folder {
    pub title: String,
    pub fields: Vec<Field>,
}

impl Folder {
    fn number(&mut self, label: &str, binding: Binding, speed: f64) -> &mut Self {
        self.fields.push(Field {
            label: label.to_string(),
            binding,
            speed,
            palette: None,
        });
        self
    }

    fn color(&mut self, label: &str, binding: Binding, palette: Color) -> &mut Self {
        self.fields.push(Field {
            label: label.to_string(),
            binding,
            speed: 0.0,
            palette: Some(palette),
        });
        self
    }
}

/// Address of one field inside the panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRef {
    pub folder: usize,
    pub field: usize,
}

/// Folders of controls bound to live scene values
///
/// Values are written straight into the scene with no validation; a binding
/// whose node is gone or of the wrong kind reads as `None` and ignores
/// writes.
#[derive(Debug, Clone)]
pub struct ControlPanel {
    folders: Vec<Folder>,
    pub visible: bool,
}

impl ControlPanel {
    pub fn new() -> Self {
        Self {
            folders: Vec::new(),
            visible: true,
        }
    }

    pub fn folders(&self) -> &[Folder] {
        &self.folders
    }

    fn add_folder(&mut self, title: &str) -> &mut Folder {
        self.folders.push(Folder {
            title: title.to_string(),
            fields: Vec::new(),
        });
        let last = self.folders.len() - 1;
        &mut self.folders[last]
    }

    /// `x`, `y`, `z`, `intensity` and `color` for one point light
    ///
    /// The color control starts at `palette`, which need not match the
    /// light's current color.
    pub fn add_light(&mut self, title: &str, light: NodeId, palette: Color) {
        self.add_folder(title)
            .number("x", Binding::LightPosition { light, axis: Axis::X }, 0.1)
            .number("y", Binding::LightPosition { light, axis: Axis::Y }, 0.1)
            .number("z", Binding::LightPosition { light, axis: Axis::Z }, 0.1)
            .number("intensity", Binding::LightIntensity { light }, 0.05)
            .color("color", Binding::LightColor { light }, palette);
    }

    /// Rate controls for the given spin axes
    pub fn add_spin(&mut self, title: &str, axes: &[Axis]) {
        let folder = self.add_folder(title);
        for &axis in axes {
            folder.number(axis_label(axis), Binding::SpinRate { axis }, 0.001);
        }
    }

    /// Look a field up by folder title and label
    pub fn field(&self, folder: &str, label: &str) -> Option<FieldRef> {
        let folder_index = self.folders.iter().position(|f| f.title == folder)?;
        let field_index = self.folders[folder_index]
            .fields
            .iter()
            .position(|f| f.label == label)?;
        Some(FieldRef {
            folder: folder_index,
            field: field_index,
        })
    }

    fn entry(&self, at: FieldRef) -> Option<&Field> {
        self.folders.get(at.folder)?.fields.get(at.field)
    }

    /// Current value of a field
    pub fn get(&self, scene: &SceneGraph, at: FieldRef) -> Option<FieldValue> {
        let field = self.entry(at)?;
        read_binding(scene, field)
    }

    /// Write a value through to the scene; returns whether it landed
    pub fn set(&mut self, scene: &mut SceneGraph, at: FieldRef, value: FieldValue) -> bool {
        let Some(field) = self
            .folders
            .get_mut(at.folder)
            .and_then(|folder| folder.fields.get_mut(at.field))
        else {
            return false;
        };
        write_binding(scene, field, value)
    }

    /// Draw the panel as a floating egui window
    pub fn show(&mut self, ctx: &egui::Context, scene: &mut SceneGraph) {
        if !self.visible || self.folders.is_empty() {
            return;
        }

        egui::Window::new("Controls")
            .anchor(egui::Align2::RIGHT_TOP, egui::vec2(-10.0, 10.0))
            .resizable(false)
            .show(ctx, |ui| {
                for (folder_index, folder) in self.folders.iter_mut().enumerate() {
                    egui::CollapsingHeader::new(folder.title.as_str())
                        .default_open(true)
                        .show(ui, |ui| {
                            egui::Grid::new(("controls", folder_index))
                                .num_columns(2)
                                .show(ui, |ui| {
                                    for field in &mut folder.fields {
                                        ui.label(field.label.as_str());
                                        show_field(ui, scene, field);
                                        ui.end_row();
                                    }
                                });
                        });
                }
            });
    }
}

impl Default for ControlPanel {
    fn default() -> Self {
        Self::new()
    }
}

fn show_field(ui: &mut egui::Ui, scene: &mut SceneGraph, field: &mut Field) {
    match read_binding(scene, field) {
        Some(FieldValue::Number(mut value)) => {
            let response = ui.add(egui::DragValue::new(&mut value).speed(field.speed));
            if response.changed() {
                write_binding(scene, field, FieldValue::Number(value));
            }
        }
        Some(FieldValue::Color(color)) => {
            let mut rgb = color.to_array();
            if ui.color_edit_button_rgb(&mut rgb).changed() {
                write_binding(scene, field, FieldValue::Color(Color::from(rgb)));
            }
        }
        None => {
            ui.weak("unavailable");
        }
    }
}

fn read_binding(scene: &SceneGraph, field: &Field) -> Option<FieldValue> {
    match field.binding {
        Binding::LightPosition { light, axis } => {
            let node = scene.node(light)?;
            node.point_light()?;
            let position = node.transform.position;
            Some(FieldValue::Number(match axis {
                Axis::X => position.x,
                Axis::Y => position.y,
                Axis::Z => position.z,
            }))
        }
        Binding::LightIntensity { light } => {
            let light = scene.node(light)?.point_light()?;
            Some(FieldValue::Number(light.intensity))
        }
        Binding::LightColor { light } => {
            scene.node(light)?.point_light()?;
            field.palette.map(FieldValue::Color)
        }
        Binding::SpinRate { axis } => Some(FieldValue::Number(scene.spin.rate(axis))),
    }
}

fn write_binding(scene: &mut SceneGraph, field: &mut Field, value: FieldValue) -> bool {
    match (field.binding, value) {
        (Binding::LightPosition { light, axis }, FieldValue::Number(v)) => {
            let Some(node) = scene.node_mut(light) else {
                return false;
            };
            if node.point_light().is_none() {
                return false;
            }
            let position = &mut node.transform.position;
            match axis {
                Axis::X => position.x = v,
                Axis::Y => position.y = v,
                Axis::Z => position.z = v,
            }
            true
        }
        (Binding::LightIntensity { light }, FieldValue::Number(v)) => {
            match scene.node_mut(light).and_then(|node| node.point_light_mut()) {
                Some(light) => {
                    light.intensity = v;
                    true
                }
                None => false,
            }
        }
        (Binding::LightColor { light }, FieldValue::Color(color)) => {
            match scene.node_mut(light).and_then(|node| node.point_light_mut()) {
                Some(light) => {
                    light.color = color;
                    field.palette = Some(color);
                    true
                }
                None => false,
            }
        }
        (Binding::SpinRate { axis }, FieldValue::Number(v)) => {
            *scene.spin.rate_mut(axis) = v;
            true
        }
        (binding, value) => {
            log::warn!("Control {:?} cannot take {:?}", binding, value);
            false
        }
    }
}

fn axis_label(axis: Axis) -> &'static str {
    match axis {
        Axis::X => "x",
        Axis::Y => "y",
        Axis::Z => "z",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Node, NodeKind, PointLight};

    fn scene_with_light() -> (SceneGraph, NodeId) {
        let mut scene = SceneGraph::default();
        let light = scene.add(Node::new(
            "key",
            NodeKind::PointLight(PointLight::new(Color::from_hex(0x8928ce), 10.0)),
        ));
        (scene, light)
    }

    #[test]
    fn test_light_folder_layout() {
        let (_, light) = scene_with_light();
        let mut panel = ControlPanel::new();
        panel.add_light("Light 1", light, Color::from_hex(0x49ce28));

        let labels: Vec<_> = panel.folders()[0].fields.iter().map(|f| f.label.as_str()).collect();
        assert_eq!(labels, ["x", "y", "z", "intensity", "color"]);
    }

    #[test]
    fn test_color_reads_palette_not_light() {
        let (scene, light) = scene_with_light();
        let mut panel = ControlPanel::new();
        panel.add_light("Light 1", light, Color::from_hex(0x49ce28));

        let color = panel.field("Light 1", "color").unwrap();
        assert_eq!(
            panel.get(&scene, color),
            Some(FieldValue::Color(Color::from_hex(0x49ce28)))
        );
        let node = scene.node(light).unwrap().point_light().unwrap();
        assert_eq!(node.color, Color::from_hex(0x8928ce));
    }

    #[test]
    fn test_mismatched_value_is_rejected() {
        let (mut scene, light) = scene_with_light();
        let mut panel = ControlPanel::new();
        panel.add_light("Light 1", light, Color::WHITE);

        let x = panel.field("Light 1", "x").unwrap();
        assert!(!panel.set(&mut scene, x, FieldValue::Color(Color::BLACK)));
    }

    #[test]
    fn test_unknown_field_lookup() {
        let panel = ControlPanel::new();
        assert!(panel.field("Light 1", "x").is_none());
    }
}
