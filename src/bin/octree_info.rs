//! Octree inspection tool: builds (or loads) the octree for a PLY scan and
//! runs both selectors against it.
//!
//! Usage: cargo run --release --bin octree_info -- <FILE.ply> [OPTIONS]
//!
//! Options:
//!   --depth <N>         Maximum octree depth (default: from config, 10)
//!   --config <PATH>     JSON engine config
//!   --camera <X,Y,Z>    Camera position in local space (default: outside the root cube on +z)
//!   --level <L>         Also report the fixed-level snapshot for level L
//!   --gpu               Use the wgpu backend for the parallel selector

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use glam::Vec3;

use pointlod::core::{EngineConfig, logging};
use pointlod::octree::Octree;
use pointlod::points::PlyPointSource;
use pointlod::render::{GpuContext, GpuWavefront};
use pointlod::select::{
    HostWavefront, LodQuery, ParallelSelector, SequentialSelector, WavefrontBackend,
};

fn main() -> ExitCode {
    logging::init();

    let args: Vec<String> = std::env::args().collect();
    let Some(source) = args.get(1).filter(|a| !a.starts_with("--")).map(PathBuf::from) else {
        eprintln!("Usage: octree_info <file.ply> [--depth N] [--config path.json] [--camera x,y,z] [--level L] [--gpu]");
        return ExitCode::FAILURE;
    };

    let mut config = match parse_str_arg(&args, "--config") {
        Some(path) => match EngineConfig::from_json_file(Path::new(&path)) {
            Ok(config) => config,
            Err(e) => {
                log::error!("{}", e);
                return ExitCode::FAILURE;
            }
        },
        None => EngineConfig::default(),
    };
    if let Some(depth) = parse_u8_arg(&args, "--depth") {
        config.build.max_depth = depth;
    }

    let start = Instant::now();
    let octree = match Octree::open(&source, &config.build, &PlyPointSource) {
        Ok(octree) => octree,
        Err(e) => {
            log::error!("Failed to open {}: {}", source.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let (center, size) = octree.bounding_cube();
    println!("=== Octree: {} ===", source.display());
    println!("Nodes:  {}", octree.node_count());
    println!("Leaves: {}", octree.leaf_count());
    println!("Depth:  {} (limit {})", octree.depth(), config.build.max_depth);
    println!("Points: {}", octree.root().summary.point_count);
    println!("Cube:   center {:?}, size {:.4}", center, size);
    println!("Memory: {:.1}MB", octree.memory_usage() as f64 / (1024.0 * 1024.0));
    println!("Ready in {:.1?}", start.elapsed());
    println!();

    let camera = parse_vec3_arg(&args, "--camera")
        .unwrap_or_else(|| center + Vec3::new(0.0, 0.0, size * 1.5));
    let query = LodQuery::new(camera, &config.view);

    let sequential = SequentialSelector::new(&octree);
    let start = Instant::now();
    let expected: BTreeSet<u32> = sequential.select_indices(&query).into_iter().collect();
    println!("Sequential: {} vertices in {:.1?}", expected.len(), start.elapsed());

    let matched = if args.iter().any(|a| a == "--gpu") {
        match GpuContext::new_headless_blocking()
            .and_then(|context| GpuWavefront::new(&context, &octree))
        {
            Ok(backend) => run_parallel("GPU", backend, &octree, &query, &expected),
            Err(e) => {
                log::error!("GPU backend unavailable: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        run_parallel("Host", HostWavefront::new(&octree), &octree, &query, &expected)
    };

    if let Some(level) = parse_u32_arg(&args, "--level") {
        let vertices = sequential.vertices_at_level(level);
        println!("Level {}: {} vertices", level, vertices.len());
    }

    if matched { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

/// Run the parallel selector once and compare against the sequential result
fn run_parallel<B: WavefrontBackend>(
    name: &str,
    backend: B,
    octree: &Octree,
    query: &LodQuery,
    expected: &BTreeSet<u32>,
) -> bool {
    let mut selector = ParallelSelector::new(backend, octree);
    let start = Instant::now();
    let count = selector.select(query);
    let elapsed = start.elapsed();

    let actual: BTreeSet<u32> = match selector.vertex_indices() {
        Ok(indices) => indices.into_iter().collect(),
        Err(e) => {
            log::error!("{} readback failed: {}", name, e);
            return false;
        }
    };

    let matched = actual == *expected;
    println!(
        "{} parallel: {} vertices in {:.1?} ({})",
        name,
        count,
        elapsed,
        if matched { "matches sequential" } else { "MISMATCH" }
    );
    matched
}

fn parse_u32_arg(args: &[String], flag: &str) -> Option<u32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_u8_arg(args: &[String], flag: &str) -> Option<u8> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn parse_vec3_arg(args: &[String], flag: &str) -> Option<Vec3> {
    let text = parse_str_arg(args, flag)?;
    let parts: Vec<f32> = text.split(',').filter_map(|p| p.trim().parse().ok()).collect();
    match parts.as_slice() {
        [x, y, z] => Some(Vec3::new(*x, *y, *z)),
        _ => None,
    }
}
