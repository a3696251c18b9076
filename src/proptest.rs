use crate::assembly::global::ScatterDiscipline;
use crate::assembly::partition::Partitioning;
use crate::mesh::procedural::{create_unit_square_uniform_quad_mesh_2d, create_unit_square_uniform_tri_mesh_2d};
use crate::mesh::Mesh;
use crate::settings::AssemblySettings;
use ::proptest::collection::vec;
use ::proptest::prelude::*;

pub fn partitioning_strategy() -> impl Strategy<Value = Partitioning> {
    prop_oneof![
        Just(Partitioning::Contiguous),
        (1..8usize).prop_map(|block_size| Partitioning::BlockInterleaved { block_size }),
    ]
}

pub fn discipline_strategy() -> impl Strategy<Value = ScatterDiscipline> {
    prop_oneof![Just(ScatterDiscipline::Atomic), Just(ScatterDiscipline::ThreadPartials)]
}

/// Settings with between 1 and `max_threads` worker threads.
pub fn assembly_settings_strategy(max_threads: usize) -> impl Strategy<Value = AssemblySettings> {
    (1..=max_threads.max(1), partitioning_strategy(), discipline_strategy()).prop_map(
        |(num_threads, partitioning, discipline)| {
            AssemblySettings::default()
                .with_num_threads(num_threads)
                .with_partitioning(partitioning)
                .with_discipline(discipline)
        },
    )
}

/// Uniform triangle or quad meshes of the unit square with at most `max_cells_per_dim` cells
/// along each side, with boundary segments.
///
/// Interior vertices are perturbed by less than a quarter of the cell width, which keeps every
/// element non-degenerate and counter-clockwise.
pub fn unit_square_mesh_strategy(max_cells_per_dim: usize) -> impl Strategy<Value = Mesh<f64>> {
    (1..=max_cells_per_dim.max(1), any::<bool>())
        .prop_flat_map(|(cells, triangles)| {
            let num_vertices = (cells + 1) * (cells + 1);
            let perturbations = vec([-1.0..1.0, -1.0..1.0], num_vertices);
            (Just(cells), Just(triangles), perturbations)
        })
        .prop_map(|(cells, triangles, perturbations)| {
            let mut mesh = if triangles {
                create_unit_square_uniform_tri_mesh_2d(cells)
            } else {
                create_unit_square_uniform_quad_mesh_2d(cells)
            };
            let max_offset = 0.2 / cells as f64;
            for (v, ([dx, dy], vertex)) in perturbations.iter().zip(mesh.vertices_mut()).enumerate() {
                let (i, j) = (v % (cells + 1), v / (cells + 1));
                if i > 0 && i < cells && j > 0 && j < cells {
                    vertex.x += max_offset * dx;
                    vertex.y += max_offset * dy;
                }
            }
            mesh
        })
}
