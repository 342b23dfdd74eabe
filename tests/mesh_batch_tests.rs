//! Mesh Batch Tests
//!
//! Tests for:
//! - Splitting list appends at primitive boundaries
//! - Strip appends drawn as runs of their own
//! - Topology, texture and depth changes ending the run
//! - White fallback texture for untextured geometry
//! - Vertex contents and per-frame vertex budget

mod common;

use glam::{Vec2, Vec3};
use wgpu::PrimitiveTopology;

use common::{Command, RecordingDevice};
use loom::batch::{MeshBatch, MeshVertex};
use loom::color::Color;
use loom::errors::LoomError;
use loom::frame::FrameIndex;
use loom::settings::MeshBatchSettings;

fn settings() -> MeshBatchSettings {
    MeshBatchSettings {
        max_vertices: 7,
        max_vertices_per_frame: 64,
        max_flushes: 8,
        ..Default::default()
    }
}

fn new_batch(device: &RecordingDevice, settings: MeshBatchSettings) -> MeshBatch<RecordingDevice> {
    common::init_logger();
    let mut batch = MeshBatch::new(device.clone(), settings).unwrap();
    batch.set_texture(&device.texture(1, 1)).unwrap();
    batch
}

fn triangles(count: usize) -> Vec<MeshVertex> {
    (0..count * 3)
        .map(|i| MeshVertex::at(Vec3::new(i as f32, 0.0, 0.0)))
        .collect()
}

fn draw_counts(device: &RecordingDevice) -> Vec<u32> {
    device
        .draws()
        .into_iter()
        .filter_map(|c| match c {
            Command::Draw { vertices, .. } => Some(vertices.end),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Run Splitting
// ============================================================================

#[test]
fn list_appends_split_at_primitive_boundaries() {
    let device = RecordingDevice::new();
    let mut batch = new_batch(&device, settings());

    batch
        .begin(FrameIndex(1), device.pass(), PrimitiveTopology::TriangleList)
        .unwrap();
    batch.draw_vertices(&triangles(4)).unwrap();
    assert_eq!(batch.pending_vertices(), 6);
    batch.end().unwrap();

    // Seven vertices fit per run, but only six make whole triangles.
    assert_eq!(draw_counts(&device), vec![6, 6]);
    assert_eq!(batch.stats().items_in_frame, 12);
}

#[test]
fn small_appends_accumulate() {
    let device = RecordingDevice::new();
    let mut batch = new_batch(&device, settings());

    batch
        .begin(FrameIndex(1), device.pass(), PrimitiveTopology::LineList)
        .unwrap();
    for _ in 0..3 {
        batch
            .draw_vertices(&[MeshVertex::at(Vec3::ZERO), MeshVertex::at(Vec3::X)])
            .unwrap();
    }
    batch.end().unwrap();

    assert_eq!(draw_counts(&device), vec![6]);
}

#[test]
fn partial_primitive_is_rejected() {
    let device = RecordingDevice::new();
    let mut batch = new_batch(&device, settings());

    batch
        .begin(FrameIndex(1), device.pass(), PrimitiveTopology::TriangleList)
        .unwrap();
    assert_eq!(
        batch.draw_vertices(&triangles(1)[..2]),
        Err(LoomError::InvalidVertexCount {
            count: 2,
            multiple: 3,
        })
    );
    assert_eq!(batch.pending_vertices(), 0);
}

#[test]
fn strip_appends_are_separate_draws() {
    let device = RecordingDevice::new();
    let mut batch = new_batch(&device, settings());
    let strip: Vec<MeshVertex> = (0..4).map(|i| MeshVertex::at(Vec3::splat(i as f32))).collect();

    batch
        .begin(FrameIndex(1), device.pass(), PrimitiveTopology::TriangleStrip)
        .unwrap();
    batch.draw_vertices(&strip).unwrap();
    batch.draw_vertices(&strip[..3]).unwrap();
    assert_eq!(draw_counts(&device), vec![4, 3]);
    batch.end().unwrap();
    assert_eq!(device.draws().len(), 2);
}

#[test]
fn oversized_strip_is_refused() {
    let device = RecordingDevice::new();
    let mut batch = new_batch(&device, settings());
    let strip = vec![MeshVertex::at(Vec3::ZERO); 8];

    batch
        .begin(FrameIndex(1), device.pass(), PrimitiveTopology::LineStrip)
        .unwrap();
    let err = batch.draw_vertices(&strip).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Too many strip vertices (7). Increase max_vertices."
    );
}

// ============================================================================
// Render State
// ============================================================================

#[test]
fn topology_change_ends_run_and_switches_pipeline() {
    let device = RecordingDevice::new();
    let mut batch = new_batch(&device, settings());

    batch
        .begin(FrameIndex(1), device.pass(), PrimitiveTopology::TriangleList)
        .unwrap();
    batch.draw_vertices(&triangles(1)).unwrap();
    batch.set_topology(PrimitiveTopology::TriangleList).unwrap();
    assert!(device.draws().is_empty());

    batch.set_topology(PrimitiveTopology::PointList).unwrap();
    assert_eq!(draw_counts(&device), vec![3]);
    batch.draw_vertices(&[MeshVertex::at(Vec3::ONE)]).unwrap();
    batch.end().unwrap();

    let journal = device.journal();
    let topologies: Vec<_> = journal.pipelines.iter().map(|p| p.key.topology).collect();
    assert_eq!(
        topologies,
        vec![PrimitiveTopology::TriangleList, PrimitiveTopology::PointList]
    );
}

#[test]
fn texture_change_ends_run() {
    let device = RecordingDevice::new();
    let mut batch = new_batch(&device, settings());
    let other = device.texture(8, 8);

    batch
        .begin(FrameIndex(1), device.pass(), PrimitiveTopology::TriangleList)
        .unwrap();
    batch.draw_vertices(&triangles(1)).unwrap();
    batch.set_texture(&other).unwrap();
    batch.set_texture(&other).unwrap();
    batch.draw_vertices(&triangles(1)).unwrap();
    batch.end().unwrap();

    assert_eq!(draw_counts(&device), vec![3, 3]);
}

#[test]
fn depth_test_is_part_of_the_pipeline() {
    let device = RecordingDevice::new();
    let mut batch = new_batch(
        &device,
        MeshBatchSettings {
            depth_format: Some(wgpu::TextureFormat::Depth32Float),
            ..settings()
        },
    );

    batch
        .begin(FrameIndex(1), device.pass(), PrimitiveTopology::TriangleList)
        .unwrap();
    batch.draw_vertices(&triangles(1)).unwrap();
    batch.set_depth_test(true).unwrap();
    batch.draw_vertices(&triangles(1)).unwrap();
    batch.end().unwrap();

    let journal = device.journal();
    let depth: Vec<_> = journal
        .pipelines
        .iter()
        .map(|p| p.key.depth.as_ref().map(|d| d.test_enabled))
        .collect();
    assert_eq!(depth, vec![Some(false), Some(true)]);
}

#[test]
fn untextured_geometry_samples_white_fallback() {
    common::init_logger();
    let device = RecordingDevice::new();
    let mut batch = MeshBatch::new(device.clone(), settings()).unwrap();

    batch
        .begin(FrameIndex(1), device.pass(), PrimitiveTopology::LineList)
        .unwrap();
    batch
        .draw_vertices(&[
            MeshVertex::at(Vec3::ZERO).with_color(Color::BLACK),
            MeshVertex::at(Vec3::X).with_color(Color::BLACK),
        ])
        .unwrap();
    batch.end().unwrap();

    assert_eq!(draw_counts(&device), vec![2]);
    assert_eq!(batch.stats().refused_flushes, 0);

    let views = device.bound_views(1);
    assert_eq!(views.len(), 1);
    let white = device.texture_record(views[0]).unwrap();
    assert_eq!((white.width, white.height), (1, 1));
    assert_eq!(white.pixels, vec![255, 255, 255, 255]);
}

#[test]
fn reset_texture_restores_fallback() {
    let device = RecordingDevice::new();
    let mut batch = new_batch(&device, settings());

    batch
        .begin(FrameIndex(1), device.pass(), PrimitiveTopology::TriangleList)
        .unwrap();
    batch.draw_vertices(&triangles(1)).unwrap();
    batch.reset_texture().unwrap();
    batch.draw_vertices(&triangles(1)).unwrap();
    batch.end().unwrap();

    assert_eq!(draw_counts(&device), vec![3, 3]);
    let views = device.bound_views(1);
    assert!(device.texture_record(views[0]).is_none());
    assert!(device.texture_record(views[1]).is_some());
}

// ============================================================================
// Contents & Budget
// ============================================================================

#[test]
fn vertices_are_uploaded_verbatim() {
    let device = RecordingDevice::new();
    let mut batch = new_batch(&device, settings());
    let vertex = MeshVertex::new(
        Vec3::new(1.0, 2.0, 3.0),
        Color::new(0.25, 0.5, 0.75, 1.0),
        Vec2::new(0.5, 0.5),
        Vec3::Y,
    );

    batch
        .begin(FrameIndex(1), device.pass(), PrimitiveTopology::PointList)
        .unwrap();
    batch.draw_vertices(&[vertex]).unwrap();
    batch.end().unwrap();

    let buffer = device.buffer_by_label("mesh batch vertices");
    assert_eq!(
        device.read_f32s(buffer, 0, 12),
        vec![1.0, 2.0, 3.0, 0.25, 0.5, 0.75, 1.0, 0.5, 0.5, 0.0, 1.0, 0.0]
    );
}

#[test]
fn exhausted_frame_vertices_are_refused() {
    let device = RecordingDevice::new();
    let mut batch = new_batch(
        &device,
        MeshBatchSettings {
            max_vertices: 6,
            max_vertices_per_frame: 6,
            ..settings()
        },
    );

    batch
        .begin(FrameIndex(1), device.pass(), PrimitiveTopology::TriangleList)
        .unwrap();
    batch.draw_vertices(&triangles(2)).unwrap();
    batch.flush().unwrap();
    batch.draw_vertices(&triangles(1)).unwrap();

    let err = batch.flush().unwrap_err();
    assert_eq!(
        err.to_string(),
        "Too many vertices (6). Increase max_vertices_per_frame."
    );
    assert_eq!(batch.pending_vertices(), 3);

    batch.end().unwrap();
    assert_eq!(batch.stats().refused_flushes, 1);
    assert_eq!(batch.pending_vertices(), 0);
}
