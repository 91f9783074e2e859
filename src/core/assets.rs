use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use anyhow::anyhow;

use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::executor::block_on;
use futures::StreamExt;
use glam::Vec3;

use crate::loaders::{Asset, AssetLoader, AssetSource};
use crate::scene::{NodeId, NodeKind, SceneGraph, Texture, Tracked};

/// Scale, position and orientation applied to a node before insertion
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Placement {
    pub position: Option<Vec3>,
    pub scale: Option<Vec3>,
    pub look_at: Option<Vec3>,
}

/// One asset to load and where it goes once decoded
#[derive(Debug, Clone)]
pub struct AssetRequest {
    pub name: String,
    pub source: AssetSource,
    pub placement: Placement,
    /// Handle bound to the inserted node
    pub tracked: Option<Tracked>,
    /// Node a texture attaches to, by name
    pub target: Option<String>,
}

impl AssetRequest {
    pub fn new(name: impl Into<String>, source: AssetSource) -> Self {
        Self {
            name: name.into(),
            source,
            placement: Placement::default(),
            tracked: None,
            target: None,
        }
    }
}

/// Message sent from a load worker to the frame thread
#[derive(Debug)]
pub enum LoadEvent {
    Progress { name: String, fraction: f32 },
    Loaded { request: AssetRequest, asset: Asset },
    Failed { request: AssetRequest, error: anyhow::Error },
}

/// Owns in-flight loads and applies their results to a scene
///
/// Loads run on worker threads that never see the scene; completions queue
/// up on a channel until the frame thread calls [`AssetQueue::drain`].
pub struct AssetQueue {
    loader: Arc<dyn AssetLoader>,
    sender: UnboundedSender<LoadEvent>,
    receiver: UnboundedReceiver<LoadEvent>,
    pending: usize,
    failed: usize,
}

impl AssetQueue {
    pub fn new(loader: Arc<dyn AssetLoader>) -> Self {
        let (sender, receiver) = mpsc::unbounded();
        Self {
            loader,
            sender,
            receiver,
            pending: 0,
            failed: 0,
        }
    }

    /// Start loading in the background; fire-and-forget
    pub fn request(&mut self, request: AssetRequest) {
        log::info!("Requesting asset '{}' from {:?}", request.name, request.source.path());
        self.pending += 1;

        let loader = Arc::clone(&self.loader);
        let sender = self.sender.clone();
        let spawned = thread::Builder::new()
            .name(format!("load-{}", request.name))
            .spawn(move || {
                let name = request.name.clone();
                let progress_sender = sender.clone();
                let mut progress = |fraction: f32| {
                    let _ = progress_sender.unbounded_send(LoadEvent::Progress {
                        name: name.clone(),
                        fraction,
                    });
                };
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    loader.load(&request.name, &request.source, &mut progress)
                }));
                let event = match outcome {
                    Ok(Ok(asset)) => LoadEvent::Loaded { request, asset },
                    Ok(Err(error)) => LoadEvent::Failed { request, error },
                    Err(payload) => LoadEvent::Failed {
                        request,
                        error: anyhow!("loader panicked: {}", panic_message(payload.as_ref())),
                    },
                };
                // Receiver gone means the scene is shutting down
                let _ = sender.unbounded_send(event);
            });

        if let Err(err) = spawned {
            self.pending -= 1;
            self.failed += 1;
            log::error!("Failed to spawn asset loader thread: {}", err);
        }
    }

    /// Loads still in flight
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Loads that ended in failure so far
    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Apply every completed load without blocking; returns the number of
    /// loads that finished (successfully or not)
    pub fn drain(&mut self, scene: &mut SceneGraph) -> usize {
        let mut finished = 0;
        while let Ok(Some(event)) = self.receiver.try_next() {
            if self.apply(scene, event) {
                finished += 1;
            }
        }
        finished
    }

    /// Block until every in-flight load has finished and been applied
    pub fn settle(&mut self, scene: &mut SceneGraph) {
        while self.pending > 0 {
            match block_on(self.receiver.next()) {
                Some(event) => {
                    self.apply(scene, event);
                }
                None => break,
            }
        }
    }

    fn apply(&mut self, scene: &mut SceneGraph, event: LoadEvent) -> bool {
        match event {
            LoadEvent::Progress { name, fraction } => {
                log::debug!("Loading '{}': {:.0}%", name, fraction * 100.0);
                false
            }
            LoadEvent::Loaded { request, asset } => {
                self.pending = self.pending.saturating_sub(1);
                match asset {
                    Asset::Node(node) => {
                        insert_node(scene, &request, node);
                    }
                    Asset::Texture(texture) => attach_texture(scene, &request, texture),
                }
                true
            }
            LoadEvent::Failed { request, error } => {
                self.pending = self.pending.saturating_sub(1);
                self.failed += 1;
                log::error!("Failed to load '{}': {:#}", request.name, error);
                true
            }
        }
    }
}

impl std::fmt::Debug for AssetQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetQueue")
            .field("pending", &self.pending)
            .field("failed", &self.failed)
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown cause")
}

/// Place a loaded node, add it to the scene and bind its handle
pub fn insert_node(scene: &mut SceneGraph, request: &AssetRequest, mut node: crate::scene::Node) -> NodeId {
    let placement = request.placement;
    if let Some(scale) = placement.scale {
        node.transform.scale = scale;
    }
    if let Some(position) = placement.position {
        node.transform.position = position;
    }
    if let Some(target) = placement.look_at {
        node.transform.look_at(target);
    }

    let id = scene.add(node);
    if let Some(handle) = request.tracked {
        scene.track(handle, id);
        log::info!("Asset '{}' bound as {:?}", request.name, handle);
    } else {
        log::info!("Asset '{}' added to scene", request.name);
    }
    id
}

fn attach_texture(scene: &mut SceneGraph, request: &AssetRequest, texture: Texture) {
    let Some(target) = request.target.as_deref() else {
        log::warn!("Texture '{}' has no target node, ignoring", request.name);
        return;
    };
    let Some(node) = scene.find(target).and_then(|id| scene.node_mut(id)) else {
        log::warn!("Texture '{}' target '{}' not found", request.name, target);
        return;
    };

    let texture = Arc::new(texture);
    match &mut node.kind {
        NodeKind::Mesh(mesh) => mesh.map = Some(texture),
        NodeKind::Points(points) => points.sprite = Some(texture),
        _ => {
            log::warn!(
                "Texture '{}' target '{}' has no material",
                request.name,
                target
            );
            return;
        }
    }
    log::info!("Texture '{}' attached to '{}'", request.name, target);
}
