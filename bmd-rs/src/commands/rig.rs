//! Rig command implementations

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use std::{fs, path::Path, path::PathBuf, sync::Arc};

use bmd_rig::animation::{BoneHierarchyEvaluator, EvaluatorOptions};
use bmd_rig::{
    BONE_UNIFORM_NAME, InstanceOptions, MAX_BONES, ModelInstance, RiggedModel, SkinOptions,
    export_scene,
};

use crate::utils::{
    TreeOptions, add_table_row, bone_tree, create_table, format_flag, format_position,
    format_rotation, format_seconds, format_vec3, print_section, render_tree,
};

#[derive(Subcommand)]
pub enum RigCommands {
    /// Display bones, actions and meshes of a model
    Info {
        /// Path to the model (JSON)
        file: PathBuf,

        /// Show the bone hierarchy as a tree
        #[arg(short, long)]
        tree: bool,

        /// Maximum tree depth to display
        #[arg(short, long)]
        depth: Option<usize>,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// Evaluate the skeleton at a point in time
    Sample {
        /// Path to the model (JSON)
        file: PathBuf,

        #[command(flatten)]
        playback: PlaybackArgs,

        /// Largest per-element change treated as unchanged
        #[arg(long, default_value_t = 1e-5)]
        epsilon: f32,

        /// Print world matrices as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Build the skinning buffer of one mesh at a point in time
    Skin {
        /// Path to the model (JSON)
        file: PathBuf,

        #[command(flatten)]
        playback: PlaybackArgs,

        /// Mesh index
        #[arg(short, long, default_value_t = 0)]
        mesh: usize,

        /// Matrix slots in the buffer
        #[arg(long, default_value_t = MAX_BONES)]
        max_bones: usize,

        /// Print the flat buffer as JSON
        #[arg(long)]
        json: bool,
    },

    /// Export the model as an interchange scene (JSON)
    Export {
        /// Path to the model (JSON)
        file: PathBuf,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Playback settings shared by sampling commands
#[derive(clap::Args, Debug, Clone)]
pub struct PlaybackArgs {
    /// Action index to play
    #[arg(short, long, default_value_t = 0)]
    pub action: usize,

    /// Simulated time in seconds since the action started
    #[arg(short, long, default_value_t = 0.0)]
    pub time: f64,

    /// Animation speed multiplier
    #[arg(short, long, default_value_t = 1.0)]
    pub speed: f32,

    /// Tick length in seconds (one tick if omitted)
    #[arg(long)]
    pub step: Option<f64>,

    /// Height added to the root of root-locked actions
    #[arg(long, default_value_t = 0.0)]
    pub height_offset: f32,
}

pub fn execute(cmd: RigCommands) -> Result<()> {
    match cmd {
        RigCommands::Info {
            file,
            tree,
            depth,
            no_color,
        } => handle_info(&file, tree, depth, no_color),
        RigCommands::Sample {
            file,
            playback,
            epsilon,
            json,
        } => handle_sample(&file, &playback, epsilon, json),
        RigCommands::Skin {
            file,
            playback,
            mesh,
            max_bones,
            json,
        } => handle_skin(&file, &playback, mesh, max_bones, json),
        RigCommands::Export { file, output } => handle_export(&file, output.as_deref()),
    }
}

fn load_model(path: &Path) -> Result<Arc<RiggedModel>> {
    log::info!("Loading model: {}", path.display());
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read model from {}", path.display()))?;
    let model = RiggedModel::from_json(&text)
        .with_context(|| format!("Failed to parse model from {}", path.display()))?;
    Ok(Arc::new(model))
}

/// Load, switch to the requested action and play up to the requested time
///
/// Returns the instance and how many iterations finished on the way.
fn play(
    model: Arc<RiggedModel>,
    playback: &PlaybackArgs,
    options: InstanceOptions,
) -> Result<(ModelInstance, usize)> {
    if playback.time < 0.0 || !playback.time.is_finite() {
        bail!("Time must be a non-negative number of seconds");
    }

    let mut instance = ModelInstance::with_options(model.name.clone(), options);
    instance.set_action(playback.action);
    instance.set_animation_speed(playback.speed);
    instance.set_root_height_offset(playback.height_offset);
    instance.load(model)?;

    let step = match playback.step {
        Some(step) if step > 0.0 && step.is_finite() => step,
        Some(step) => bail!("Invalid tick length {step}"),
        None => playback.time.max(f64::MIN_POSITIVE),
    };

    let mut finished = 0;
    let mut elapsed = 0.0;
    while elapsed < playback.time {
        let dt = step.min(playback.time - elapsed);
        if instance.update(dt).iteration_finished {
            finished += 1;
        }
        elapsed += dt;
    }

    Ok((instance, finished))
}

fn handle_info(path: &Path, tree: bool, depth: Option<usize>, no_color: bool) -> Result<()> {
    let model = load_model(path)?;

    println!("=== Model: {} ===", model.name);
    println!("Bones:   {}", model.bone_count());
    println!("Actions: {}", model.action_count());
    println!("Meshes:  {}", model.meshes.len());

    if tree {
        let evaluator = BoneHierarchyEvaluator::new(&model, EvaluatorOptions::default());
        let options = TreeOptions {
            max_depth: depth,
            no_color,
        };
        println!();
        print!("{}", render_tree(&bone_tree(&model, &evaluator), &options));
    } else {
        let mut bones = create_table(&["#", "Name", "Parent", "Dummy"]);
        for (i, bone) in model.bones.iter().enumerate() {
            add_table_row(
                &mut bones,
                vec![
                    i.to_string(),
                    bone.name.clone(),
                    bone.parent_index().map_or_else(|| "-".to_string(), |p| p.to_string()),
                    format_flag(bone.dummy).to_string(),
                ],
            );
        }
        print_section("Bones", &bones);
    }

    let mut actions = create_table(&["#", "Name", "Frames", "Speed", "Duration", "Root lock"]);
    for (i, action) in model.actions.iter().enumerate() {
        let duration = if action.is_static() || action.playback_speed <= 0.0 {
            "static".to_string()
        } else {
            format_seconds((action.frame_count - 1) as f64 / f64::from(action.playback_speed))
        };
        add_table_row(
            &mut actions,
            vec![
                i.to_string(),
                action.name.clone(),
                action.frame_count.to_string(),
                format!("{:.2}", action.playback_speed),
                duration,
                format_flag(action.lock_root_xy).to_string(),
            ],
        );
    }
    print_section("Actions", &actions);

    let mut meshes = create_table(&["#", "Name", "Flags"]);
    for (i, mesh) in model.meshes.iter().enumerate() {
        add_table_row(
            &mut meshes,
            vec![i.to_string(), mesh.name.clone(), format!("{:?}", mesh.flags)],
        );
    }
    print_section("Meshes", &meshes);

    let problems = model.validate();
    if !problems.is_empty() {
        println!("\n=== Problems ===");
        for problem in problems {
            println!("  - {problem}");
        }
    }

    Ok(())
}

fn handle_sample(path: &Path, playback: &PlaybackArgs, epsilon: f32, json: bool) -> Result<()> {
    let model = load_model(path)?;
    let options = InstanceOptions {
        evaluator: EvaluatorOptions {
            epsilon,
            ..EvaluatorOptions::default()
        },
        ..InstanceOptions::default()
    };
    let (instance, finished) = play(Arc::clone(&model), playback, options)?;
    let frame = instance.frame();

    if json {
        let bones: Vec<_> = model
            .bones
            .iter()
            .zip(instance.bone_matrices())
            .map(|(bone, world)| {
                serde_json::json!({
                    "bone": bone.index,
                    "name": bone.name,
                    "world": world.to_cols_array(),
                })
            })
            .collect();
        let output = serde_json::json!({
            "action": frame.action,
            "frame_index": frame.frame_index,
            "next_frame": frame.next_frame,
            "t": frame.t,
            "iterations_finished": finished,
            "bones": bones,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("=== Sample: {} at {} ===", model.name, format_seconds(playback.time));
    println!(
        "Action {} frame {} -> {} (t = {:.4})",
        frame.action, frame.frame_index, frame.next_frame, frame.t
    );
    println!("Iterations finished: {finished}");

    let mut table = create_table(&["#", "Name", "Local translation", "Local rotation", "World position"]);
    for (i, bone) in model.bones.iter().enumerate() {
        let local = instance.evaluator().local_pose(i).unwrap_or_default();
        add_table_row(
            &mut table,
            vec![
                i.to_string(),
                bone.name.clone(),
                format_vec3(local.translation),
                format_rotation(local.rotation),
                format_position(&instance.evaluator().world(i)),
            ],
        );
    }
    print_section("Bones", &table);

    Ok(())
}

fn handle_skin(
    path: &Path,
    playback: &PlaybackArgs,
    mesh: usize,
    max_bones: usize,
    json: bool,
) -> Result<()> {
    let model = load_model(path)?;
    if max_bones > MAX_BONES {
        log::warn!("--max-bones {max_bones} exceeds the shader limit, using {MAX_BONES}");
    }
    let options = InstanceOptions {
        skin: SkinOptions { max_bones },
        ..InstanceOptions::default()
    };
    let (instance, _) = play(Arc::clone(&model), playback, options)?;

    let Some(skin) = instance.skin(mesh) else {
        bail!(
            "Mesh {mesh} out of range ({} meshes)",
            instance.skin_bindings().len()
        );
    };

    if json {
        println!("{}", serde_json::to_string(skin.buffer())?);
        return Ok(());
    }

    let binding = skin.binding();
    println!("=== Skin: {} mesh {} ===", model.name, binding.mesh_index);
    println!("Uniform:  {BONE_UNIFORM_NAME}[{}]", skin.slots());
    println!("Floats:   {}", binding.matrices.len());
    println!("Revision: {}", binding.revision);
    println!("Flags:    {:?}", binding.flags);
    println!("Visible:  {}", format_flag(binding.is_visible()));

    let used = model.bone_count().min(skin.slots());
    let mut table = create_table(&["Slot", "Bone", "Position"]);
    for slot in 0..used {
        add_table_row(
            &mut table,
            vec![
                slot.to_string(),
                model.bones[slot].name.clone(),
                format_position(&skin.matrix(slot)),
            ],
        );
    }
    print_section("Slots", &table);
    if model.bone_count() > skin.slots() {
        println!(
            "({} bones beyond slot {} were truncated)",
            model.bone_count() - skin.slots(),
            skin.slots() - 1
        );
    }

    Ok(())
}

fn handle_export(path: &Path, output: Option<&Path>) -> Result<()> {
    let model = load_model(path)?;
    let scene = export_scene(&model);
    let text = scene.to_json()?;

    match output {
        Some(out) => {
            fs::write(out, text)
                .with_context(|| format!("Failed to write scene to {}", out.display()))?;
            log::info!(
                "Exported {} nodes and {} animations to {}",
                scene.nodes.len(),
                scene.animations.len(),
                out.display()
            );
        }
        None => println!("{text}"),
    }

    Ok(())
}
