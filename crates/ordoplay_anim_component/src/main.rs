// SPDX-License-Identifier: MIT OR Apache-2.0
//! `OrdoPlay` animation preview - headless state graph playback
//!
//! Loads a state graph and its tracks (or builds a small demo rig), runs the
//! animation component for a fixed number of frames, and logs state changes,
//! timeline events and the final pose.
//!
//! ```text
//! ordoplay_anim_preview [preview.ron]
//! ```

use ordoplay_anim_component::{
    AnimComponent, AnimComponentEvent, Capabilities, ConfigError, ParameterOverride,
    PreviewConfig, ScriptBehaviour, ScriptContext, ScriptError, ScriptEvent, ScriptRegistry,
    SharedBinder,
};
use ordoplay_anim_graph::{
    BlendChild, BlendTree, GraphError, LayerData, ParameterData, ParameterType, ParameterValue,
    SharedParameters, StateData, StateGraph,
};
use ordoplay_anim_track::{
    AnimCurve, AnimData, AnimEvent, AnimEvents, AnimMask, AnimTrack, InterpolationMode,
    PropertyBinder, TrackError,
};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Anything that stops a preview run
#[derive(Debug, thiserror::Error)]
enum PreviewError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid track file {path}: {source}")]
    TrackFile {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Track(#[from] TrackError),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

fn main() {
    let config = match std::env::args_os().nth(1) {
        Some(path) => PreviewConfig::load(Path::new(&path)),
        None => Ok(PreviewConfig::default()),
    };

    let filter = config
        .as_ref()
        .map_or("info", |config| config.log_filter.as_str());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting OrdoPlay animation preview v{}", env!("CARGO_PKG_VERSION"));

    let result = config.map_err(PreviewError::from).and_then(|config| run(&config));
    if let Err(e) = result {
        tracing::error!("Preview failed: {e}");
        std::process::exit(1);
    }
}

fn run(config: &PreviewConfig) -> Result<(), PreviewError> {
    let binder = Arc::new(Mutex::new(PropertyBinder::new()));
    let shared: SharedBinder = binder.clone();
    let mut component = AnimComponent::new(shared, config.component.clone());

    component.on(|event| match event {
        AnimComponentEvent::StateChanged { layer, from, to } => {
            tracing::info!("[{layer}] {from} -> {to}");
        }
        AnimComponentEvent::Timeline { layer, state, event } => {
            tracing::info!("[{layer}] {state}: event {} at {:.2}s", event.name, event.time);
        }
        AnimComponentEvent::Loop { layer, clip } => tracing::debug!("[{layer}] {clip} looped"),
        AnimComponentEvent::End { layer, clip } => tracing::info!("[{layer}] {clip} finished"),
        AnimComponentEvent::Play => tracing::info!("Playing"),
        AnimComponentEvent::Pause => tracing::info!("Paused"),
    });

    match &config.graph {
        Some(path) => load_configured(&mut component, config, path)?,
        None => load_demo(&mut component)?,
    }
    apply_parameters(&mut component, &config.parameters);

    let mut scripts = ScriptRegistry::default();
    scripts.on(|event| {
        if let ScriptEvent::Error { name, message, .. } = event {
            tracing::warn!("Script {name} disabled: {message}");
        }
    });
    if config.graph.is_none() {
        scripts.register(SpeedRamp::new(component.parameters().clone(), config.duration));
    }
    scripts.register(PoseLogger::new(binder.clone(), config.frame_rate.round() as usize));

    let frames = config.frame_count();
    let dt = config.frame_time();
    tracing::info!("Simulating {} frames at {} fps", frames, config.frame_rate);
    for _ in 0..frames {
        scripts.update(dt);
        component.update(dt);
        scripts.post_update(dt);
    }

    for layer in component.layers() {
        tracing::info!(
            "Layer {}: state {} progress {:.2} weight {:.2}",
            layer.name(),
            layer.active_state(),
            layer.active_state_progress(),
            layer.weight()
        );
    }
    for (node, property, target) in binder.lock().values() {
        tracing::info!("{node}.{property} = {:?}", target.value);
    }
    Ok(())
}

fn load_configured(
    component: &mut AnimComponent,
    config: &PreviewConfig,
    graph_path: &Path,
) -> Result<(), PreviewError> {
    let graph = StateGraph::from_json(&read(graph_path)?)?;
    component.load_state_graph(graph)?;

    for binding in &config.tracks {
        let track: AnimTrack =
            serde_json::from_str(&read(&binding.path)?).map_err(|source| PreviewError::TrackFile {
                path: binding.path.clone(),
                source,
            })?;
        tracing::debug!("Assigning {} to {}", track.name(), binding.node);
        component.assign_animation(
            &binding.node,
            Arc::new(track),
            binding.layer.as_deref(),
            binding.speed,
            binding.looping,
        );
    }

    if !component.playable() {
        tracing::warn!("Some states have no animation assigned");
    }
    Ok(())
}

fn read(path: &Path) -> Result<String, PreviewError> {
    std::fs::read_to_string(path).map_err(|source| PreviewError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn apply_parameters(component: &mut AnimComponent, parameters: &[ParameterOverride]) {
    for parameter in parameters {
        match parameter {
            ParameterOverride::Float(name, value) => component.set_float(name, *value),
            ParameterOverride::Integer(name, value) => component.set_integer(name, *value),
            ParameterOverride::Boolean(name, value) => component.set_boolean(name, *value),
            ParameterOverride::Trigger(name) => component.set_trigger(name, false),
        }
    }
}

// ============================================================================
// Demo rig
// ============================================================================

/// Base layer walks a locomotion blend tree, an overlay layer waves an arm
fn load_demo(component: &mut AnimComponent) -> Result<(), PreviewError> {
    let mut base = LayerData::new("Base");
    base.states.push(StateData {
        blend_tree: Some(BlendTree {
            parameter: "speed".to_string(),
            children: vec![
                BlendChild {
                    name: "Idle".to_string(),
                    point: 0.0,
                    speed: None,
                },
                BlendChild {
                    name: "Run".to_string(),
                    point: 1.0,
                    speed: Some(1.5),
                },
            ],
        }),
        ..StateData::new("Locomotion")
    });

    let mut overlay = LayerData::new("Overlay");
    overlay.states.push(StateData {
        looping: false,
        ..StateData::new("Wave")
    });
    overlay.weight = 0.0;
    overlay.mask = Some(AnimMask::new().include_children("Arm"));

    let mut graph = StateGraph {
        layers: vec![base, overlay],
        ..StateGraph::default()
    };
    graph.parameters.insert(
        "speed".to_string(),
        ParameterData {
            kind: ParameterType::Float,
            value: serde_json::json!(0.0),
        },
    );
    for layer in &mut graph.layers {
        layer.ensure_entry_transition();
    }
    component.load_state_graph(graph)?;

    let bob = |name: &str, duration: f32, height: f32| {
        track(
            name,
            duration,
            "Hips",
            "localPosition",
            3,
            vec![0.0, 0.0, 0.0, 0.0, height, 0.0, 0.0, 0.0, 0.0],
            AnimEvents::default(),
        )
    };
    component.assign_animation("Locomotion.Idle", bob("idle", 2.0, 0.05)?, None, None, None);
    component.assign_animation("Locomotion.Run", bob("run", 0.8, 0.2)?, None, None, None);

    let wave = track(
        "wave",
        1.0,
        "Arm/Forearm",
        "localRotation",
        4,
        vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.5, 0.866_025_4, 0.0, 0.0, 0.0, 1.0],
        AnimEvents::new(&[AnimEvent::new("wave_peak", 0.5)]),
    )?;
    component.assign_animation("Wave", wave, Some("Overlay"), None, None);

    if let Some(overlay) = component.find_animation_layer_mut("Overlay") {
        overlay.blend_to_weight(1.0, 0.5);
    }
    Ok(())
}

/// Three evenly spaced keys over `duration`
fn track(
    name: &str,
    duration: f32,
    node: &str,
    property: &str,
    components: usize,
    values: Vec<f32>,
    events: AnimEvents,
) -> Result<Arc<AnimTrack>, TrackError> {
    let track = AnimTrack::new(
        name,
        duration,
        vec![AnimData::times(vec![0.0, duration * 0.5, duration])],
        vec![AnimData::new(components, values)],
        vec![AnimCurve {
            node: node.to_string(),
            property: property.to_string(),
            input: 0,
            output: 0,
            interpolation: InterpolationMode::Linear,
            quaternion: components == 4,
        }],
        events,
    )?;
    Ok(Arc::new(track))
}

// ============================================================================
// Demo scripts
// ============================================================================

/// Ramps the `speed` parameter from 0 to 1 over the run
struct SpeedRamp {
    parameters: SharedParameters,
    elapsed: f32,
    duration: f32,
}

impl SpeedRamp {
    fn new(parameters: SharedParameters, duration: f32) -> Self {
        Self {
            parameters,
            elapsed: 0.0,
            duration: duration.max(f32::EPSILON),
        }
    }
}

impl ScriptBehaviour for SpeedRamp {
    fn name(&self) -> &str {
        "SpeedRamp"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            update: true,
            post_update: false,
        }
    }

    fn update(&mut self, dt: f32, _ctx: &mut ScriptContext) -> Result<(), ScriptError> {
        self.elapsed += dt;
        let speed = (self.elapsed / self.duration).min(1.0);
        self.parameters
            .write()
            .set("speed", ParameterValue::Float(speed))?;
        Ok(())
    }
}

/// Logs the pose once every `interval` frames
struct PoseLogger {
    binder: Arc<Mutex<PropertyBinder>>,
    interval: usize,
    frame: usize,
}

impl PoseLogger {
    fn new(binder: Arc<Mutex<PropertyBinder>>, interval: usize) -> Self {
        Self {
            binder,
            interval: interval.max(1),
            frame: 0,
        }
    }
}

impl ScriptBehaviour for PoseLogger {
    fn name(&self) -> &str {
        "PoseLogger"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            update: false,
            post_update: true,
        }
    }

    fn post_update(&mut self, _dt: f32, _ctx: &mut ScriptContext) -> Result<(), ScriptError> {
        self.frame += 1;
        if self.frame % self.interval == 0 {
            for (node, property, target) in self.binder.lock().values() {
                tracing::debug!("frame {}: {node}.{property} = {:?}", self.frame, target.value);
            }
        }
        Ok(())
    }
}
