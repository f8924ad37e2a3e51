use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use glam::Vec3;
use portalspace_common::EntityId;
use portalspace_kernel::{
    GraphicsDescription, PortalDescription, PortalSettings, Scene, SceneDescription,
    TravellerDescription, ViewerDescription,
};
use portalspace_render::{DebugBackend, FrameScheduler};
use portalspace_tools::SceneInspector;
use tracing_subscriber::EnvFilter;

/// Depth of the trigger volume on each side of a portal.
const THRESHOLD_DEPTH: f32 = 1.0;

#[derive(Parser)]
#[command(name = "portalspace-cli", about = "CLI tool for portalspace scenes")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print engine version and crate info
    Info,
    /// Walk a crate through a built-in portal pair
    Simulate {
        /// Number of frames to simulate
        #[arg(short, long, default_value = "12")]
        frames: u32,
        /// Recursion limit for both portals
        #[arg(short, long, default_value = "3")]
        recursion: u32,
    },
    /// Check a scene description file (.yaml, .yml or .json)
    Validate { path: PathBuf },
    /// Run a scene description for a number of frames
    Run {
        path: PathBuf,
        #[arg(short, long, default_value = "60")]
        frames: u32,
        /// Seconds per frame
        #[arg(long, default_value = "0.016666")]
        dt: f32,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match cli.command {
        Commands::Info => {
            println!("portalspace-cli v{}", env!("CARGO_PKG_VERSION"));
            let settings = PortalSettings::default();
            println!(
                "kernel: recursion_limit={} near_clip_offset={} near_clip_limit={}",
                settings.recursion_limit, settings.near_clip_offset, settings.near_clip_limit
            );
            println!("kernel: {}", portalspace_kernel::crate_info());
            println!("render: {}", portalspace_render::crate_info());
            println!("tools: {}", portalspace_tools::crate_info());
        }
        Commands::Simulate { frames, recursion } => {
            let description = demo_scene(recursion);
            run(&description, frames, 0.1, cli.verbose)?;
        }
        Commands::Validate { path } => {
            let description = SceneDescription::load(&path)
                .with_context(|| format!("loading {}", path.display()))?;
            let scene = Scene::from_description(&description)
                .with_context(|| format!("building {}", path.display()))?;
            println!("{}: OK", path.display());
            println!("{}", SceneInspector::summary(&scene));
            for id in SceneInspector::list_portals(&scene) {
                if let Some(info) = SceneInspector::inspect_portal(&scene, id) {
                    println!("  {info}");
                }
            }
        }
        Commands::Run { path, frames, dt } => {
            let description = SceneDescription::load(&path)
                .with_context(|| format!("loading {}", path.display()))?;
            run(&description, frames, dt, cli.verbose)?;
        }
    }

    Ok(())
}

fn run(description: &SceneDescription, frames: u32, dt: f32, verbose: bool) -> anyhow::Result<()> {
    let mut scene = Scene::from_description(description)?;
    tracing::info!(frames, dt, "running scene");
    let viewer = description.viewer.camera();
    let [width, height] = description.resolution;
    let mut scheduler = FrameScheduler::new(DebugBackend::new(width, height));

    let mut velocities: BTreeMap<EntityId, Vec3> = BTreeMap::new();
    for traveller in &description.travellers {
        if let Some(t) = scene.traveller_by_name(&traveller.name) {
            velocities.insert(t.id(), traveller.velocity);
        }
    }

    println!("{}", SceneInspector::summary(&scene));
    for frame in 0..frames {
        for (id, velocity) in &velocities {
            scene.translate_traveller(*id, *velocity * dt)?;
        }
        update_thresholds(&mut scene)?;

        let Some(report) = scheduler.step(&mut scene, &viewer) else {
            continue;
        };
        for crossing in &report.crossings {
            // Carry momentum through the portal.
            let turn = crossing.after.rotation * crossing.before.rotation.inverse();
            if let Some(v) = velocities.get_mut(&crossing.traveller) {
                *v = turn * *v;
            }
            let name = scene
                .traveller(crossing.traveller)
                .map_or("?", |t| t.name.as_str());
            let p = crossing.after.position;
            println!("frame {frame}: '{name}' crossed to ({:.2}, {:.2}, {:.2})", p.x, p.y, p.z);
        }
        for (portal, error) in &report.failures {
            println!("frame {frame}: portal {portal} failed: {error}");
        }
        if verbose {
            println!(
                "frame {frame}: {} portal(s) rendered, {} pass(es)",
                report.rendered_portals(),
                report.passes()
            );
        }
    }

    println!("{}", SceneInspector::summary(&scene));
    for id in SceneInspector::list_travellers(&scene) {
        if let Some(info) = SceneInspector::inspect_traveller(&scene, id) {
            println!("  {info}");
        }
    }
    if verbose {
        print!("{}", scheduler.backend().report());
    }
    Ok(())
}

/// Stand-in for a collision system: raise threshold enter/exit signals when a
/// traveller's reference point moves in or out of the box around each screen.
fn update_thresholds(scene: &mut Scene) -> anyhow::Result<()> {
    let mut signals = Vec::new();
    for portal in scene.portals().values() {
        let half = portal.screen.local.scale.truncate() * 0.5;
        let to_local = portal.transform.world_to_local();
        for traveller in scene.travellers().values() {
            let local = to_local.transform_point3(traveller.reference_point());
            let inside = local.x.abs() <= half.x + 0.5
                && local.y.abs() <= half.y + 0.5
                && local.z.abs() <= THRESHOLD_DEPTH;
            let tracked = portal.is_tracking(traveller.id());
            if inside != tracked {
                signals.push((portal.id(), traveller.id(), inside));
            }
        }
    }
    for (portal, traveller, entered) in signals {
        if entered {
            scene.on_threshold_enter(portal, traveller)?;
        } else {
            scene.on_threshold_exit(portal, traveller)?;
        }
    }
    Ok(())
}

/// Two portals ten units apart, the second turned a quarter turn, with a crate
/// walking through the first.
fn demo_scene(recursion: u32) -> SceneDescription {
    let settings = PortalSettings {
        recursion_limit: recursion,
        ..PortalSettings::default()
    };
    SceneDescription {
        resolution: [1280, 720],
        viewer: ViewerDescription {
            position: Vec3::new(0.0, 1.0, -6.0),
            ..ViewerDescription::default()
        },
        portals: vec![
            PortalDescription {
                name: "blue".into(),
                position: Vec3::ZERO,
                rotation: Vec3::ZERO,
                screen: glam::Vec2::new(2.0, 3.0),
                linked: Some("orange".into()),
                settings,
            },
            PortalDescription {
                name: "orange".into(),
                position: Vec3::new(0.0, 0.0, -10.0),
                rotation: Vec3::new(0.0, 90.0, 0.0),
                screen: glam::Vec2::new(2.0, 3.0),
                linked: None,
                settings,
            },
        ],
        travellers: vec![TravellerDescription {
            name: "crate".into(),
            position: Vec3::new(0.0, 0.5, 0.8),
            rotation: Vec3::ZERO,
            crossing_reference: None,
            graphics: Some(GraphicsDescription {
                materials: 2,
                offset: Vec3::ZERO,
            }),
            velocity: Vec3::new(0.0, 0.0, -1.0),
        }],
    }
}
