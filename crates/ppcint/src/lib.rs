//! Interpreter for the paired single pipeline of the Gekko/Broadway floating point unit.
//!
//! Executors mutate a [`Cpu`] one decoded instruction at a time and mirror every
//! architectural side effect: the result lanes, the FPSCR exception and status bits, and
//! the CR1 shadow for record forms. An instruction either commits both result lanes or,
//! when an enabled exception is raised, commits neither; the exception bits stay raised
//! either way and nothing here ever traps.

pub mod fenv;
pub mod float;

mod paired;


use broadway::disasm::{Ins, Opcode, ParsedIns};
use broadway::{Cond, Cpu, FloatStatusReg, ResultFlags};
use easyerr::Error;

/// Interpreter settings.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// Whether to ignore unimplemented instructions instead of failing.
    pub ignore_unimplemented: bool,
}

/// Error produced when dispatching an instruction this interpreter cannot execute.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("illegal instruction {f0:?}")]
    Illegal(Ins),
    #[error("unimplemented instruction {f0:?}")]
    Unimplemented(Ins),
}

/// An executor bound to an opcode. Reads operand registers out of the [`Cpu`], computes
/// the result lanes, and commits them together with the FPSCR update.
pub type ExecutorFn = fn(&mut Interpreter, &mut Cpu, Ins);

/// Returns the executor bound to `op`, if the paired single pipeline implements it.
pub fn executor(op: Opcode) -> Option<ExecutorFn> {
    Some(match op {
        Opcode::PsAbs => Interpreter::ps_abs,
        Opcode::PsAdd => Interpreter::ps_add,
        Opcode::PsDiv => Interpreter::ps_div,
        Opcode::PsMadd => Interpreter::ps_madd,
        Opcode::PsMadds0 => Interpreter::ps_madds0,
        Opcode::PsMadds1 => Interpreter::ps_madds1,
        Opcode::PsMerge00 => Interpreter::ps_merge00,
        Opcode::PsMerge01 => Interpreter::ps_merge01,
        Opcode::PsMerge10 => Interpreter::ps_merge10,
        Opcode::PsMerge11 => Interpreter::ps_merge11,
        Opcode::PsMr => Interpreter::ps_mr,
        Opcode::PsMsub => Interpreter::ps_msub,
        Opcode::PsMul => Interpreter::ps_mul,
        Opcode::PsMuls0 => Interpreter::ps_muls0,
        Opcode::PsMuls1 => Interpreter::ps_muls1,
        Opcode::PsNabs => Interpreter::ps_nabs,
        Opcode::PsNeg => Interpreter::ps_neg,
        Opcode::PsNmadd => Interpreter::ps_nmadd,
        Opcode::PsNmsub => Interpreter::ps_nmsub,
        Opcode::PsRes => Interpreter::ps_res,
        Opcode::PsRsqrte => Interpreter::ps_rsqrte,
        Opcode::PsSel => Interpreter::ps_sel,
        Opcode::PsSub => Interpreter::ps_sub,
        Opcode::PsSum0 => Interpreter::ps_sum0,
        Opcode::PsSum1 => Interpreter::ps_sum1,
        _ => return None,
    })
}

/// Interpreter for the paired single pipeline.
pub struct Interpreter {
    settings: Settings,
}

impl Interpreter {
    /// Creates a new [`Interpreter`] with the given settings.
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Executes a single decoded instruction against `cpu`.
    pub fn exec(&mut self, cpu: &mut Cpu, ins: Ins) -> Result<(), ExecError> {
        match executor(ins.op) {
            Some(executor) => {
                executor(self, cpu, ins);
                Ok(())
            }
            None if self.settings.ignore_unimplemented => {
                self.stub(ins);
                Ok(())
            }
            None if ins.op == Opcode::Illegal => Err(ExecError::Illegal(ins)),
            None => Err(ExecError::Unimplemented(ins)),
        }
    }

    /// Stub instruction - does absolutely nothing as a temporary implementation.
    fn stub(&mut self, ins: Ins) {
        let mut parsed = ParsedIns::new();
        ins.parse_basic(&mut parsed);

        tracing::warn!("ignoring unimplemented instruction ({parsed})");
    }

    /// Folds the host exception flags accrued by the current instruction into the sticky
    /// FPSCR bits and recomputes the summary bits. `old` is the FPSCR as it was before the
    /// instruction executed; an exception bit it did not already carry raises FX.
    pub(crate) fn update_fpscr(&mut self, cpu: &mut Cpu, old: FloatStatusReg) {
        let raised = fenv::fetch();
        fenv::clear(fenv::Exceptions::ALL);

        let fpscr = &mut cpu.fpscr;
        fpscr.set_overflow(fpscr.overflow() | raised.overflow);
        fpscr.set_underflow(fpscr.underflow() | raised.underflow);
        fpscr.set_zero_divide(fpscr.zero_divide() | raised.div_by_zero);
        fpscr.set_inexact(fpscr.inexact() | raised.inexact);

        // FI tracks only the current instruction. FR is unobservable on the host.
        fpscr.set_fraction_inexact(raised.inexact);
        fpscr.set_fraction_rounded(false);

        let invalid = fpscr.any_invalid();
        fpscr.set_invalid_summary(invalid);
        fpscr.set_enabled_summary(
            (invalid && fpscr.invalid_enabled())
                || (fpscr.overflow() && fpscr.overflow_enabled())
                || (fpscr.underflow() && fpscr.underflow_enabled())
                || (fpscr.zero_divide() && fpscr.zero_divide_enabled())
                || (fpscr.inexact() && fpscr.inexact_enabled()),
        );

        let newly_set = !old.to_bits() & fpscr.to_bits() & FloatStatusReg::EXCEPTION_MASK;
        if newly_set != 0 {
            fpscr.set_exception_summary(true);
        }
    }

    /// Updates the FPRF field of the FPSCR with the class and sign of `value`.
    pub(crate) fn update_fprf(&mut self, cpu: &mut Cpu, value: f64) {
        cpu.fpscr.set_result_flags(ResultFlags::classify(value));
    }

    /// Updates CR1 with a copy of FPSCR[FX, FEX, VX, OX].
    pub(crate) fn update_cr1(&mut self, cpu: &mut Cpu) {
        let cond = Cond::from_bits((cpu.fpscr.to_bits() >> 28) as u8);
        cpu.cr.set_field(1, cond);
    }
}
