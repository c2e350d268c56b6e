//! Lazily built shader programs owned by a structure or quantity.

use crate::engine::ShaderProgram;
use crate::error::RenderResult;

/// Whether the programs of a [`ProgramCache`] exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgramState {
    /// Nothing built yet, or invalidated since the last build.
    #[default]
    Uninitialized,
    /// Programs are built and can be drawn.
    Built,
}

/// A set of programs that are built on first use and rebuilt whole after
/// [`ProgramCache::invalidate`].
#[derive(Default)]
pub struct ProgramCache {
    programs: Vec<Box<dyn ShaderProgram>>,
    state: ProgramState,
    build_count: u64,
}

impl ProgramCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ProgramState {
        self.state
    }

    pub fn is_built(&self) -> bool {
        self.state == ProgramState::Built
    }

    /// Number of times the builder has run successfully.
    pub fn build_count(&self) -> u64 {
        self.build_count
    }

    /// Runs `builder` unless the programs are already built.
    ///
    /// A failed build leaves the cache uninitialized, so the next call retries.
    pub fn ensure_built<F>(&mut self, builder: F) -> RenderResult<()>
    where
        F: FnOnce() -> RenderResult<Vec<Box<dyn ShaderProgram>>>,
    {
        if self.state == ProgramState::Built {
            return Ok(());
        }
        self.programs = builder()?;
        self.state = ProgramState::Built;
        self.build_count += 1;
        Ok(())
    }

    /// Drops the programs. The next `ensure_built` rebuilds them.
    pub fn invalidate(&mut self) {
        self.programs.clear();
        self.state = ProgramState::Uninitialized;
    }

    pub fn programs(&self) -> &[Box<dyn ShaderProgram>] {
        &self.programs
    }

    pub fn programs_mut(&mut self) -> &mut [Box<dyn ShaderProgram>] {
        &mut self.programs
    }

    pub fn program_mut(&mut self, slot: usize) -> Option<&mut (dyn ShaderProgram + 'static)> {
        self.programs.get_mut(slot).map(|p| &mut **p)
    }

    /// Draws every program in build order.
    pub fn draw_all(&mut self) -> RenderResult<()> {
        for program in &mut self.programs {
            program.draw()?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ProgramCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgramCache")
            .field("state", &self.state)
            .field("programs", &self.programs.len())
            .field("build_count", &self.build_count)
            .finish()
    }
}
