//! Register model of the Gekko/Broadway CPUs as seen by the floating point pipeline: the
//! paired single register file, the FPSCR, and the condition register.
//!
//! The `powerpc` crate, which is a disassembler of PowerPC instructions, is re-exported
//! under [`disasm`].

#[cfg(test)]
mod test;

use bitos::bitos;
use strum::{FromRepr, VariantArray};

/// Disassembling of PowerPC instructions. Re-export of the [`powerpc`] crate.
#[rustfmt::skip]
pub use powerpc as disasm;

/// A floating point register, holding a pair of single precision values.
///
/// `ps0` is stored extended to double precision, which is how the scalar instructions view
/// it. It always holds either a value exactly representable in single precision or a NaN
/// whose payload has to survive moves bit for bit. `ps1` is a true single.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PairedSingle {
    ps0: f64,
    ps1: f32,
}

impl PairedSingle {
    #[inline(always)]
    pub const fn new(ps0: f64, ps1: f32) -> Self {
        Self { ps0, ps1 }
    }

    /// The high slot, extended to double precision.
    #[inline(always)]
    pub const fn ps0(&self) -> f64 {
        self.ps0
    }

    /// The low slot.
    #[inline(always)]
    pub const fn ps1(&self) -> f32 {
        self.ps1
    }

    /// Raw bit pattern of the high slot.
    #[inline(always)]
    pub const fn ps0_bits(&self) -> u64 {
        self.ps0.to_bits()
    }

    /// Raw bit pattern of the low slot.
    #[inline(always)]
    pub const fn ps1_bits(&self) -> u32 {
        self.ps1.to_bits()
    }

    #[inline(always)]
    pub const fn set_ps0(&mut self, value: f64) {
        self.ps0 = value;
    }

    #[inline(always)]
    pub const fn set_ps1(&mut self, value: f32) {
        self.ps1 = value;
    }

    #[inline(always)]
    pub const fn set_ps0_bits(&mut self, bits: u64) {
        self.ps0 = f64::from_bits(bits);
    }

    #[inline(always)]
    pub const fn set_ps1_bits(&mut self, bits: u32) {
        self.ps1 = f32::from_bits(bits);
    }
}

/// A condition group field in the [`CondReg`].
#[bitos(4)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Cond {
    /// Whether the result has overflowed.
    #[bits(0)]
    pub ov: bool,
    /// Whether the operands are equal.
    #[bits(1)]
    pub eq: bool,
    /// Whether the first operand is greater than the second.
    #[bits(2)]
    pub gt: bool,
    /// Whether the first operand is less than the second.
    #[bits(3)]
    pub lt: bool,
}

/// The condition register (CR) contains 8 fields, named CR0-CR7, each holding the flags of
/// some comparison operation.
///
/// Floating point instructions which have the `Rc` flag set update CR1 with a copy of
/// FPSCR[FX, FEX, VX, OX], indicating floating point exception status.
#[bitos(32)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CondReg {
    // NOTE: CR0 is actually index 7! PPC bit order is big endian
    #[bits(..)]
    pub fields: [Cond; 8],
}

impl CondReg {
    /// Returns condition field `index`, in PPC numbering (CR0 first).
    #[inline(always)]
    pub fn field(&self, index: usize) -> Cond {
        let shift = 4 * (7 - index);
        Cond::from_bits(((self.to_bits() >> shift) & 0b1111) as u8)
    }

    /// Replaces condition field `index`, in PPC numbering (CR0 first).
    #[inline(always)]
    pub fn set_field(&mut self, index: usize, cond: Cond) {
        let shift = 4 * (7 - index);
        let bits = (self.to_bits() & !(0b1111 << shift)) | ((cond.to_bits() as u32) << shift);
        *self = Self::from_bits(bits);
    }
}

/// Floating-point rounding mode, the RN field of the FPSCR.
#[bitos(2)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoundingMode {
    #[default]
    Nearest       = 0b00,
    TowardsZero   = 0b01,
    TowardsPosInf = 0b10,
    TowardsNegInf = 0b11,
}

/// Class and sign descriptor of the last result, the FPRF field of the FPSCR.
#[bitos(5)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ResultFlags {
    /// Result is unordered or NaN.
    #[bits(0)]
    pub unordered: bool,
    /// Result is equal to zero.
    #[bits(1)]
    pub equal: bool,
    /// Result is greater than zero.
    #[bits(2)]
    pub greater: bool,
    /// Result is less than zero.
    #[bits(3)]
    pub less: bool,
    /// Class descriptor: quiet NaN, denormal, or negative zero.
    #[bits(4)]
    pub class: bool,
}

impl ResultFlags {
    /// Describes the class and sign of a result value.
    pub fn classify(value: f64) -> Self {
        let mut flags = Self::default();
        if value.is_nan() {
            flags.set_class(true);
            flags.set_unordered(true);
        } else if value == 0.0 {
            flags.set_equal(true);
            flags.set_class(value.is_sign_negative());
        } else {
            if value.is_sign_negative() {
                flags.set_less(true);
            } else {
                flags.set_greater(true);
            }

            if value.is_infinite() {
                flags.set_unordered(true);
            } else if value.is_subnormal() {
                flags.set_class(true);
            }
        }

        flags
    }
}

/// The Floating Point Status and Control Register.
///
/// Exception bits are sticky: instructions only ever set them, and software clears them.
/// The three summary bits are derived and cannot be changed directly by software.
#[bitos(32)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FloatStatusReg {
    /// Floating-point rounding mode.
    #[bits(0..2)]
    pub rounding: RoundingMode,
    /// Whether IEEE conformance is disabled.
    #[bits(2)]
    pub non_ieee: bool,
    /// Whether inexact exceptions are enabled.
    #[bits(3)]
    pub inexact_enabled: bool,
    /// Whether zero divide exceptions are enabled.
    #[bits(4)]
    pub zero_divide_enabled: bool,
    /// Whether underflow exceptions are enabled.
    #[bits(5)]
    pub underflow_enabled: bool,
    /// Whether overflow exceptions are enabled.
    #[bits(6)]
    pub overflow_enabled: bool,
    /// Whether invalid operation exceptions are enabled.
    #[bits(7)]
    pub invalid_enabled: bool,
    /// Invalid operation exception for an invalid integer conversion.
    #[bits(8)]
    pub invalid_int_convert: bool,
    /// Invalid operation exception for the square root of a negative.
    #[bits(9)]
    pub invalid_sqrt: bool,
    /// Invalid operation exception requested by software.
    #[bits(10)]
    pub invalid_software: bool,
    /// Class and sign of the last result.
    #[bits(12..17)]
    pub result_flags: ResultFlags,
    /// Whether the last arithmetic instruction rounded an intermediate result or caused a
    /// disabled overflow exception.
    #[bits(17)]
    pub fraction_inexact: bool,
    /// Whether the last arithmetic instruction that rounded an intermediate result
    /// incremented the fraction.
    #[bits(18)]
    pub fraction_rounded: bool,
    /// Invalid operation exception for an unordered compare.
    #[bits(19)]
    pub invalid_compare: bool,
    /// Invalid operation exception for `inf * 0`.
    #[bits(20)]
    pub invalid_inf_mul_zero: bool,
    /// Invalid operation exception for `0 / 0`.
    #[bits(21)]
    pub invalid_zero_div_zero: bool,
    /// Invalid operation exception for `inf / inf`.
    #[bits(22)]
    pub invalid_inf_div_inf: bool,
    /// Invalid operation exception for `inf - inf`.
    #[bits(23)]
    pub invalid_inf_sub_inf: bool,
    /// Invalid operation exception for a signaling NaN operand.
    #[bits(24)]
    pub invalid_snan: bool,
    /// Inexact exception.
    #[bits(25)]
    pub inexact: bool,
    /// Zero divide exception.
    #[bits(26)]
    pub zero_divide: bool,
    /// Underflow exception.
    #[bits(27)]
    pub underflow: bool,
    /// Overflow exception.
    #[bits(28)]
    pub overflow: bool,
    /// Whether any of the invalid operation exception bits is set.
    #[bits(29)]
    pub invalid_summary: bool,
    /// Whether any enabled exception bit is set.
    #[bits(30)]
    pub enabled_summary: bool,
    /// Whether any exception bit has been set since software last cleared this bit.
    #[bits(31)]
    pub exception_summary: bool,
}

impl FloatStatusReg {
    /// Mask of the invalid operation cause bits folded into the invalid summary.
    #[rustfmt::skip]
    pub const INVALID_MASK: u32 = (1 << 8) | (1 << 9) | (1 << 10)
        | (1 << 19) | (1 << 20) | (1 << 21) | (1 << 22) | (1 << 23) | (1 << 24);

    /// Mask of the sticky exception bits which raise the exception summary when newly set.
    pub const EXCEPTION_MASK: u32 = Self::INVALID_MASK | (0b1111 << 25);

    /// Whether any invalid operation cause bit is set.
    #[inline(always)]
    pub fn any_invalid(&self) -> bool {
        self.to_bits() & Self::INVALID_MASK != 0
    }
}

/// Register state of one emulated CPU thread, as seen by the floating point pipeline. The
/// register file is zeroed at thread start.
///
/// The program counter, the integer side and the supervisor state belong to the
/// dispatcher; executors only ever touch what lives here.
#[repr(C)]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cpu {
    /// Floating Point Registers
    pub fpr: [PairedSingle; 32],
    /// Condition Register
    pub cr: CondReg,
    /// Floating Point Status and Control Register
    pub fpscr: FloatStatusReg,
}

/// A Floating Point Register index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, VariantArray)]
#[repr(u8)]
pub enum FPR {
    R0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
    R8,
    R9,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
    R16,
    R17,
    R18,
    R19,
    R20,
    R21,
    R22,
    R23,
    R24,
    R25,
    R26,
    R27,
    R28,
    R29,
    R30,
    R31,
}

impl FPR {
    /// Creates a new FPR with the given index.
    ///
    /// # Panics
    /// Panics if index is out of range.
    #[inline(always)]
    pub fn new(index: u8) -> Self {
        Self::from_repr(index).unwrap()
    }
}

/// Extension trait for [`Ins`](disasm::Ins).
pub trait InsExt {
    /// FPR indicated by field frA.
    fn fpr_a(&self) -> FPR;
    /// FPR indicated by field frB.
    fn fpr_b(&self) -> FPR;
    /// FPR indicated by field frC.
    fn fpr_c(&self) -> FPR;
    /// FPR indicated by field frD.
    fn fpr_d(&self) -> FPR;
}

impl InsExt for disasm::Ins {
    #[inline(always)]
    fn fpr_a(&self) -> FPR {
        FPR::new(self.field_fra())
    }

    #[inline(always)]
    fn fpr_b(&self) -> FPR {
        FPR::new(self.field_frb())
    }

    #[inline(always)]
    fn fpr_c(&self) -> FPR {
        FPR::new(self.field_frc())
    }

    #[inline(always)]
    fn fpr_d(&self) -> FPR {
        FPR::new(self.field_frd())
    }
}
