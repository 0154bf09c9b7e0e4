//! A board session: one processor, its memory with attached devices, and the
//! program currently loaded.

use sim_core::{ConfigError, Controller, Device, ExecError, Memory, Processor, Registries};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::assembler::Program;
use crate::config::{BoardConfig, RunLimits};
use crate::errors::LoadError;
use crate::parser::ProgramLine;

/// Why a board operation failed.
#[derive(Debug, Error)]
pub enum BoardError {
    /// The board description names something unknown or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The program did not assemble or load.
    #[error(transparent)]
    Load(#[from] LoadError),
    /// An instruction failed.
    #[error(transparent)]
    Exec(#[from] ExecError),
    /// Stepping was requested before a program loaded successfully.
    #[error("no program loaded")]
    NoProgram,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    /// Instructions executed.
    pub steps: u64,
    /// Whether the program reached its end instruction.
    pub ended: bool,
}

/// Processor, memory and devices built from a [`BoardConfig`].
pub struct Board {
    config: BoardConfig,
    processor: Processor,
    memory: Memory,
    program: Option<Program>,
    entry: Option<i64>,
}

impl std::fmt::Debug for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Board")
            .field("arch", &self.config.arch)
            .field("memory", &self.memory.size())
            .field("entry", &self.entry)
            .finish_non_exhaustive()
    }
}

impl Board {
    /// Creates the processor, sizes memory and instantiates every device.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::Config`] for unknown architecture or device
    /// names, bad device parameters, or device windows outside memory.
    pub fn build(config: BoardConfig, registries: &Registries) -> Result<Self, BoardError> {
        let mut processor = registries.architectures.create(&config.arch)?;
        let size = config.memory.resolve(processor.address_size());
        let mut memory = Memory::new(size);

        let mut controller = Controller::new();
        for descriptor in &config.devices {
            controller.create_device(descriptor, &registries.devices)?;
        }
        controller.validate_windows(size)?;
        memory.attach_controller(controller);

        processor.reset();
        info!(arch = %config.arch, memory = size, devices = config.devices.len(), "board built");
        Ok(Self {
            config,
            processor,
            memory,
            program: None,
            entry: None,
        })
    }

    /// Assembles `source` and loads it, replacing any previous program.
    ///
    /// Memory is cleared and the processor reset first. On success PC is at
    /// the entry point. The assembled program is kept even when loading
    /// fails, so its lines and errors can still be shown.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::Load`] with the aggregated line errors, or
    /// [`LoadError::NoInstruction`] for a program without code.
    pub fn load(&mut self, source: &str) -> Result<i64, BoardError> {
        self.memory.clear();
        self.processor.reset();
        self.entry = None;

        let program = Program::assemble(source, &self.processor, self.memory.size());
        let loaded = program.load(&mut self.memory);
        self.program = Some(program);
        let entry = loaded.inspect_err(|error| warn!(%error, "load failed"))?;

        self.processor.set_pc(entry);
        self.processor.clear_end();
        self.entry = Some(entry);
        Ok(entry)
    }

    /// Executes one instruction. Returns whether the program has ended.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::NoProgram`] before a successful load, or the
    /// instruction's [`ExecError`].
    pub fn step(&mut self) -> Result<bool, BoardError> {
        if self.entry.is_none() {
            return Err(BoardError::NoProgram);
        }
        Ok(self.processor.step(&mut self.memory)?)
    }

    /// Steps until the program ends or `limits` is reached.
    ///
    /// # Errors
    ///
    /// Stops at the first failing step and returns its error.
    pub fn run(&mut self, limits: RunLimits) -> Result<RunOutcome, BoardError> {
        let mut steps = 0;
        while steps < limits.max_steps {
            steps += 1;
            if self.step()? {
                debug!(steps, "program ended");
                return Ok(RunOutcome { steps, ended: true });
            }
        }
        warn!(steps, "step limit reached");
        Ok(RunOutcome { steps, ended: false })
    }

    /// Clears memory, resets the processor and reloads the current program
    /// with PC back at its entry point.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::Load`] if the program no longer fits memory.
    pub fn reset(&mut self) -> Result<(), BoardError> {
        self.memory.clear();
        self.processor.reset();
        if let (Some(program), Some(_)) = (&self.program, self.entry) {
            let entry = program.load(&mut self.memory)?;
            self.processor.set_pc(entry);
        }
        self.processor.clear_end();
        Ok(())
    }

    /// Tears every device down.
    pub fn teardown(&mut self) {
        for controller in self.memory.controllers_mut() {
            controller.delete_all();
        }
        debug!(arch = %self.config.arch, "board torn down");
    }

    /// The configuration the board was built from.
    #[must_use]
    pub const fn config(&self) -> &BoardConfig {
        &self.config
    }

    /// The processor.
    #[must_use]
    pub const fn processor(&self) -> &Processor {
        &self.processor
    }

    /// Mutable processor, for observers and manual register edits.
    pub fn processor_mut(&mut self) -> &mut Processor {
        &mut self.processor
    }

    /// Board memory.
    #[must_use]
    pub const fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Mutable memory, for observers and manual edits.
    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    /// The last assembled program, loaded or not.
    #[must_use]
    pub const fn program(&self) -> Option<&Program> {
        self.program.as_ref()
    }

    /// Entry point of the loaded program.
    #[must_use]
    pub const fn entry_point(&self) -> Option<i64> {
        self.entry
    }

    /// The code line at the current PC.
    #[must_use]
    pub fn current_line(&self) -> Option<&ProgramLine> {
        self.program.as_ref()?.line_for_address(self.processor.pc())
    }

    /// Every device, in creation order.
    pub fn devices(&self) -> impl Iterator<Item = &dyn Device> + '_ {
        self.memory
            .controllers()
            .iter()
            .flat_map(Controller::devices)
            .map(|device| -> &dyn Device { device.as_ref() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemorySize;
    use hardware::{default_registries, Led};

    fn board(config: BoardConfig) -> Board {
        Board::build(config, &default_registries()).unwrap()
    }

    fn register(board: &Board, name: &str) -> i64 {
        let cpu = board.processor().cpu();
        cpu.register(cpu.find_register(name).unwrap())
    }

    #[test]
    fn edu1_countdown_runs_to_end() {
        let mut board = board(BoardConfig::new("edu1"));
        assert_eq!(board.memory().size(), 256);
        let source = "MOVA #3\nloop: DEC A\nJMPZ done\nJMP loop\ndone: .END\n";
        assert_eq!(board.load(source).unwrap(), 0);

        let outcome = board.run(RunLimits::default()).unwrap();
        assert!(outcome.ended);
        assert_eq!(register(&board, "A"), 0);
        assert_eq!(board.current_line().map(|line| line.number), Some(5));
    }

    #[test]
    fn mos6502_program_lights_the_panel() {
        let config = BoardConfig::new("6502").with_device("Led display:8:16".parse().unwrap());
        let mut board = board(config);
        board.load("ORG $0200\nLDA #$81\nSTA $10\nEND\n").unwrap();
        assert_eq!(board.entry_point(), Some(0x0200));
        board.run(RunLimits::default()).unwrap();

        let led = board.devices().next().unwrap().as_any().downcast_ref::<Led>().unwrap();
        assert_eq!(led.value(), 0x81);
        assert!(led.lamps()[0]);
        assert!(led.lamps()[7]);
    }

    #[test]
    fn failed_load_keeps_program_but_refuses_to_step() {
        let mut board = board(BoardConfig::new("edu1"));
        let error = board.load("LDA nowhere\n.END\n").unwrap_err();
        assert!(matches!(error, BoardError::Load(LoadError::Assembly { .. })));
        assert_eq!(board.program().unwrap().lines().len(), 2);
        assert!(matches!(board.step(), Err(BoardError::NoProgram)));
    }

    #[test]
    fn reset_restores_program_and_entry() {
        let mut board = board(BoardConfig::new("edu1").with_memory(MemorySize::Bytes(64)));
        board.load(".DATA\n40 9\n.CODE 4\nLDA 40\nSTA 41\n.END\n").unwrap();
        board.run(RunLimits::default()).unwrap();
        assert_eq!(board.memory().read(41, 1).unwrap(), 9);
        assert!(board.processor().end_reached());

        board.reset().unwrap();
        assert_eq!(board.processor().pc(), 4);
        assert!(!board.processor().end_reached());
        assert_eq!(board.memory().read(41, 1).unwrap(), 0);
        assert_eq!(board.memory().read(40, 1).unwrap(), 9);
    }

    #[test]
    fn run_stops_at_the_step_limit() {
        let mut board = board(BoardConfig::new("edu1"));
        board.load("loop: JMP loop\n.END\n").unwrap();
        let outcome = board.run(RunLimits { max_steps: 10 }).unwrap();
        assert_eq!(outcome, RunOutcome { steps: 10, ended: false });
    }

    #[test]
    fn execution_errors_surface() {
        let mut board = board(BoardConfig::new("6502"));
        board.load("ORG $0200\nBRK\nEND\n").unwrap();
        assert!(matches!(board.run(RunLimits::default()), Err(BoardError::Exec(ExecError::Halted(_)))));
    }

    #[test]
    fn configuration_errors() {
        let registries = default_registries();
        let unknown = Board::build(BoardConfig::new("z80"), &registries).unwrap_err();
        assert!(matches!(unknown, BoardError::Config(ConfigError::UnknownArchitecture(_))));

        let outside = BoardConfig::new("edu1").with_device("Led display:16:255".parse().unwrap());
        let error = Board::build(outside, &registries).unwrap_err();
        assert!(matches!(error, BoardError::Config(ConfigError::WindowOutsideMemory { .. })));
    }

    #[test]
    fn teardown_removes_devices() {
        let config = BoardConfig::new("edu1").with_device("Led display:4:200".parse().unwrap());
        let mut board = board(config);
        assert_eq!(board.devices().count(), 1);
        board.teardown();
        assert_eq!(board.devices().count(), 0);
    }
}
