use serde::{Deserialize, Serialize};

use crate::{
    concurrency::{par_iter_mut1, par_iter_reduce1},
    error::SimulationError,
    floating_type_mod::FT,
    vec2f, Sample, V2,
};

#[derive(PartialEq, Eq, Debug, Clone, Copy, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    Velocity,
    Ink,
    Pressure,
    Divergence,
}

/// Square simulation grid with `n` cells per side and spacing `1/n`.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct Grid {
    n: usize,
}

impl Grid {
    pub fn new(n: usize) -> Grid {
        Grid { n }
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn num_cells(&self) -> usize {
        self.n * self.n
    }

    pub fn spacing(&self) -> FT {
        1. / self.n as FT
    }

    pub fn index(&self, i: usize, j: usize) -> usize {
        j * self.n + i
    }

    pub fn cell(&self, idx: usize) -> (usize, usize) {
        (idx % self.n, idx / self.n)
    }

    /// Normalized center of cell `(i, j)`.
    pub fn cell_uv(&self, i: usize, j: usize) -> V2 {
        let h = self.spacing();
        vec2f((i as FT + 0.5) * h, (j as FT + 0.5) * h)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    kind: FieldKind,
    grid: Grid,
    data: Vec<Sample>,
}

impl Field {
    pub fn zeros(kind: FieldKind, grid: Grid) -> Result<Field, SimulationError> {
        let cells = grid.n.checked_mul(grid.n).ok_or(SimulationError::GridTooLarge { n: grid.n })?;
        let mut data: Vec<Sample> = Vec::new();
        data.try_reserve_exact(cells)
            .map_err(|_| SimulationError::ResourceAllocation { kind, cells })?;
        data.resize(cells, Sample::zeros());
        Ok(Field { kind, grid, data })
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    pub fn texel(&self, i: usize, j: usize) -> Sample {
        self.data[self.grid.index(i, j)]
    }

    pub fn set_texel(&mut self, i: usize, j: usize, value: Sample) {
        let idx = self.grid.index(i, j);
        self.data[idx] = value;
    }

    pub fn samples(&self) -> &[Sample] {
        &self.data
    }

    pub fn samples_mut(&mut self) -> &mut [Sample] {
        &mut self.data
    }

    /// Cells in index order together with their `(i, j)` coordinates.
    pub fn iter(&self) -> impl Iterator<Item = ((usize, usize), Sample)> + '_ {
        let grid = self.grid;
        self.data.iter().enumerate().map(move |(idx, s)| (grid.cell(idx), *s))
    }

    /// Writes `f(i, j, uv)` into every cell in parallel.
    pub fn fill_with<F: Fn(usize, usize, V2) -> Sample + Send + Sync>(&mut self, f: F) {
        let grid = self.grid;
        par_iter_mut1(&mut self.data, |idx, out| {
            let (i, j) = grid.cell(idx);
            *out = f(i, j, grid.cell_uv(i, j));
        });
    }

    /// Component-wise sum over the whole grid.
    pub fn sum(&self) -> Sample {
        par_iter_reduce1(&self.data, Sample::zeros, |a, b| a + b, |_, s| *s)
    }

    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|s| s.iter().all(|c| c.is_finite()))
    }
}

/// Two same-kind fields. One is current (readable state), the other is the
/// write target of the stage in flight. `swap` flips roles without copying.
#[derive(Debug, Clone)]
pub struct DoubleBuffer {
    fields: [Field; 2],
    current: usize,
}

impl DoubleBuffer {
    pub fn allocate(kind: FieldKind, grid: Grid) -> Result<DoubleBuffer, SimulationError> {
        Ok(DoubleBuffer {
            fields: [Field::zeros(kind, grid)?, Field::zeros(kind, grid)?],
            current: 0,
        })
    }

    pub fn kind(&self) -> FieldKind {
        self.fields[0].kind
    }

    pub fn grid(&self) -> Grid {
        self.fields[0].grid
    }

    pub fn current(&self) -> &Field {
        &self.fields[self.current]
    }

    /// The non-current buffer. Its contents are stale until a stage overwrites every cell.
    pub fn writable(&mut self) -> &mut Field {
        &mut self.fields[1 - self.current]
    }

    /// Current buffer for reading and the other buffer for writing.
    pub fn split(&mut self) -> (&Field, &mut Field) {
        let [first, second] = &mut self.fields;
        if self.current == 0 {
            (&*first, second)
        } else {
            (&*second, first)
        }
    }

    /// Must only be called after every cell of `writable()` has been written.
    pub fn swap(&mut self) {
        self.current = 1 - self.current;
    }

    /// Seeds both sides with `f` so that no stale data survives a restart.
    pub fn fill_with<F: Fn(usize, usize, V2) -> Sample + Send + Sync>(&mut self, f: F) {
        for field in self.fields.iter_mut() {
            field.fill_with(&f);
        }
    }

    pub fn clear(&mut self) {
        self.fill_with(|_, _, _| Sample::zeros());
    }
}

#[cfg(test)]
mod tests {
    use super::{DoubleBuffer, Field, FieldKind, Grid};
    use crate::{error::SimulationError, sample4, Sample};

    #[test]
    fn grid_index_round_trip() {
        let grid = Grid::new(7);
        for j in 0..7 {
            for i in 0..7 {
                assert_eq!(grid.cell(grid.index(i, j)), (i, j));
            }
        }
        let uv = grid.cell_uv(0, 6);
        assert!((uv.x - 0.5 / 7.).abs() < 1e-6);
        assert!((uv.y - 6.5 / 7.).abs() < 1e-6);
    }

    #[test]
    fn oversized_grids_are_reported() {
        let n = usize::MAX / 2;
        assert!(matches!(
            Field::zeros(FieldKind::Velocity, Grid::new(n)),
            Err(SimulationError::GridTooLarge { n: m }) if m == n
        ));
        // fits in usize but not in memory
        assert!(matches!(
            DoubleBuffer::allocate(FieldKind::Ink, Grid::new(1 << (usize::BITS / 2 - 1))),
            Err(SimulationError::ResourceAllocation { kind: FieldKind::Ink, .. })
        ));
    }

    #[test]
    fn allocated_buffers_are_zero() {
        let buffer = DoubleBuffer::allocate(FieldKind::Ink, Grid::new(8)).unwrap();
        assert_eq!(buffer.current().samples().len(), 64);
        assert!(buffer.current().samples().iter().all(|s| *s == Sample::zeros()));
        assert_eq!(buffer.kind(), FieldKind::Ink);
    }

    #[test]
    fn swap_exchanges_roles_without_copying() {
        let mut buffer = DoubleBuffer::allocate(FieldKind::Pressure, Grid::new(4)).unwrap();
        buffer.writable().set_texel(1, 2, sample4(3., 0., 0., 0.));
        assert_eq!(buffer.current().texel(1, 2), Sample::zeros());

        let written_ptr = buffer.writable().samples().as_ptr();
        buffer.swap();
        assert_eq!(buffer.current().texel(1, 2), sample4(3., 0., 0., 0.));
        assert_eq!(buffer.current().samples().as_ptr(), written_ptr);

        // the old current side is now the write target and still holds its old data
        assert_eq!(buffer.writable().texel(1, 2), Sample::zeros());
    }

    #[test]
    fn split_reads_current_and_writes_other() {
        let mut buffer = DoubleBuffer::allocate(FieldKind::Velocity, Grid::new(3)).unwrap();
        buffer.fill_with(|i, j, _| sample4(i as _, j as _, 0., 0.));
        {
            let (src, dst) = buffer.split();
            dst.fill_with(|i, j, _| src.texel(i, j) * 2.);
        }
        buffer.swap();
        assert_eq!(buffer.current().texel(2, 1), sample4(4., 2., 0., 0.));
    }

    #[test]
    fn sum_adds_all_cells() {
        let mut field = Field::zeros(FieldKind::Ink, Grid::new(5)).unwrap();
        field.fill_with(|_, _, _| sample4(1., 0.5, 0., 0.));
        let sum = field.sum();
        assert_eq!(field.iter().count(), 25);
        assert_eq!(field.iter().nth(7).map(|(cell, _)| cell), Some((2, 1)));
        assert!((sum.x - 25.).abs() < 1e-4);
        assert!((sum.y - 12.5).abs() < 1e-4);
        assert!(field.is_finite());
    }
}
