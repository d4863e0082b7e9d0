use crate::{Cond, CondReg, FloatStatusReg, PairedSingle, ResultFlags};

#[test]
fn result_flags_cover_every_class() {
    let cases = [
        (f64::NAN, 0b10001),
        (f64::INFINITY, 0b00101),
        (f64::NEG_INFINITY, 0b01001),
        (1.0, 0b00100),
        (-1.0, 0b01000),
        (f64::from_bits(1), 0b10100),
        (-f64::from_bits(1), 0b11000),
        (0.0, 0b00010),
        (-0.0, 0b10010),
    ];

    for (value, bits) in cases {
        assert_eq!(
            ResultFlags::classify(value).to_bits(),
            bits,
            "classifying {value}"
        );
    }
}

#[test]
fn cond_fields_sit_in_big_endian_order() {
    let mut cr = CondReg::default();
    cr.set_field(0, Cond::from_bits(0b1111));
    assert_eq!(cr.to_bits(), 0b1111 << 28);

    cr.set_field(1, Cond::from_bits(0b1010));
    assert_eq!(cr.field(1).to_bits(), 0b1010);
    assert!(cr.field(1).lt());
    assert!(!cr.field(1).gt());
    assert!(cr.field(1).eq());
    assert!(!cr.field(1).ov());

    cr.set_field(1, Cond::from_bits(0b0000));
    assert_eq!(cr.to_bits(), 0b1111 << 28, "other fields are untouched");
}

#[test]
fn status_masks_pick_out_the_sticky_bits() {
    let mut fpscr = FloatStatusReg::default();
    fpscr.set_invalid_sqrt(true);
    assert!(fpscr.any_invalid());

    let mut fpscr = FloatStatusReg::default();
    fpscr.set_inexact(true);
    assert!(!fpscr.any_invalid());
    assert_ne!(fpscr.to_bits() & FloatStatusReg::EXCEPTION_MASK, 0);

    // enables and summaries are not sticky causes
    let mut fpscr = FloatStatusReg::default();
    fpscr.set_invalid_enabled(true);
    fpscr.set_exception_summary(true);
    assert_eq!(fpscr.to_bits() & FloatStatusReg::EXCEPTION_MASK, 0);
}

#[test]
fn paired_single_round_trips_raw_bits() {
    let mut fpr = PairedSingle::new(1.5, -2.5);
    assert_eq!(fpr.ps0_bits(), 1.5f64.to_bits());
    assert_eq!(fpr.ps1_bits(), (-2.5f32).to_bits());

    fpr.set_ps0_bits(0x7FF8_0000_0000_0001);
    fpr.set_ps1_bits(0x7FC0_0001);
    assert!(fpr.ps0().is_nan());
    assert!(fpr.ps1().is_nan());
    assert_eq!(fpr.ps0_bits(), 0x7FF8_0000_0000_0001);
    assert_eq!(fpr.ps1_bits(), 0x7FC0_0001);
}
