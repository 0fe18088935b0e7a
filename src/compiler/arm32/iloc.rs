//! The ARM32 instruction list the selector emits into, plus the
//! load/store spill protocol. `load_var`/`store_var` know how each value
//! kind is addressed and synthesize the reserved addressing temporary when
//! an offset does not fit the instruction's immediate field.

use std::fmt;

use super::registers::{reg_name, FP};
use crate::compiler::ir::{Module, ValueId, ValueKind};

#[derive(Debug, PartialEq)]
pub enum ArmInst {
    Comment(String),
    Label(String),
    Inst { op: String, operands: Vec<String> },
}

impl fmt::Display for ArmInst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArmInst::Comment(text) => f.write_fmt(format_args!("    @ {}", text)),
            ArmInst::Label(name) => f.write_fmt(format_args!("{}:", name)),
            ArmInst::Inst { op, operands } => {
                if operands.is_empty() {
                    f.write_fmt(format_args!("    {}", op))
                } else {
                    f.write_fmt(format_args!("    {} {}", op, operands.join(", ")))
                }
            }
        }
    }
}

/// Whether `v` is encodable as an ARM modified immediate (an 8-bit value
/// rotated right by an even amount).
pub fn fits_arm_imm(v: i32) -> bool {
    let u = v as u32;
    (0..32)
        .step_by(2)
        .any(|rot| u.rotate_left(rot) & !0xff == 0)
}

/// ldr/str immediate offsets are 12 bits plus sign.
pub fn fits_mem_offset(off: i32) -> bool {
    (-4095..=4095).contains(&off)
}

#[derive(Debug, Default)]
pub struct ILoc {
    code: Vec<ArmInst>,
}

impl ILoc {
    pub fn new() -> ILoc {
        ILoc { code: vec![] }
    }

    pub fn code(&self) -> &[ArmInst] {
        &self.code
    }

    pub fn comment(&mut self, text: String) {
        self.code.push(ArmInst::Comment(text));
    }

    pub fn label(&mut self, name: &str) {
        self.code.push(ArmInst::Label(name.into()));
    }

    pub fn inst(&mut self, op: &str, operands: &[&str]) {
        self.code.push(ArmInst::Inst {
            op: op.into(),
            operands: operands.iter().map(|s| s.to_string()).collect(),
        });
    }

    pub fn jump(&mut self, target: &str) {
        self.inst("b", &[target]);
    }

    pub fn call_fun(&mut self, name: &str) {
        self.inst("bl", &[name]);
    }

    /// Materializes a constant: `mov` when it encodes, a literal-pool load
    /// otherwise.
    pub fn load_imm(&mut self, reg: i32, v: i32) {
        if fits_arm_imm(v) {
            self.inst("mov", &[reg_name(reg), &format!("#{}", v)]);
        } else {
            self.inst("ldr", &[reg_name(reg), &format!("={}", v)]);
        }
    }

    /// Loads the address of a symbol.
    pub fn load_symbol(&mut self, reg: i32, symbol: &str) {
        self.inst("ldr", &[reg_name(reg), &format!("={}", symbol)]);
    }

    /// Loads `v` into `reg`, whatever it currently is: a register copy, a
    /// constant, a global, an array base address, or a stack slot.
    pub fn load_var(&mut self, m: &Module, reg: i32, v: ValueId) {
        let val = m.value(v);

        if let Some(r) = val.reg_id() {
            if r != reg {
                self.inst("mov", &[reg_name(reg), reg_name(r)]);
            }
            return;
        }

        match &val.kind {
            ValueKind::ConstInt(i) => self.load_imm(reg, *i),
            ValueKind::Global { .. } => {
                let symbol = val.ir_name.trim_start_matches('@').to_string();
                self.load_symbol(reg, &symbol);
                if !val.is_array() {
                    self.inst("ldr", &[reg_name(reg), &format!("[{}]", reg_name(reg))]);
                }
            }
            _ => {
                let (base, offset) = val
                    .mem_addr()
                    .unwrap_or_else(|| panic!("value {} has no home", val.ir_name));

                // A declared local array decays to its base address. An
                // array parameter's local (leading extent 0) instead holds
                // an address that gets loaded like a scalar.
                let is_declared_array = matches!(val.kind, ValueKind::Local { .. })
                    && val.is_array()
                    && val.dims[0] != 0;
                if is_declared_array {
                    self.lea(reg, base, offset);
                } else {
                    self.load_base_offset(reg, base, offset);
                }
            }
        }
    }

    /// Stores `reg` into `v`'s home. `tmp` is the reserved addressing
    /// register for out-of-range offsets and global symbols.
    pub fn store_var(&mut self, m: &Module, reg: i32, v: ValueId, tmp: i32) {
        let val = m.value(v);

        if let Some(r) = val.reg_id() {
            if r != reg {
                self.inst("mov", &[reg_name(r), reg_name(reg)]);
            }
            return;
        }

        match &val.kind {
            ValueKind::Global { .. } => {
                let symbol = val.ir_name.trim_start_matches('@').to_string();
                self.load_symbol(tmp, &symbol);
                self.inst("str", &[reg_name(reg), &format!("[{}]", reg_name(tmp))]);
            }
            _ => {
                let (base, offset) = val
                    .mem_addr()
                    .unwrap_or_else(|| panic!("value {} has no home", val.ir_name));
                if fits_mem_offset(offset) {
                    self.inst(
                        "str",
                        &[reg_name(reg), &format!("[{}, #{}]", reg_name(base), offset)],
                    );
                } else {
                    self.load_imm(tmp, offset);
                    self.inst("add", &[reg_name(tmp), reg_name(base), reg_name(tmp)]);
                    self.inst("str", &[reg_name(reg), &format!("[{}]", reg_name(tmp))]);
                }
            }
        }
    }

    fn load_base_offset(&mut self, reg: i32, base: i32, offset: i32) {
        if fits_mem_offset(offset) {
            self.inst(
                "ldr",
                &[reg_name(reg), &format!("[{}, #{}]", reg_name(base), offset)],
            );
        } else {
            // reg is the destination, so it can double as the address
            // scratch here.
            self.load_imm(reg, offset);
            self.inst("add", &[reg_name(reg), reg_name(base), reg_name(reg)]);
            self.inst("ldr", &[reg_name(reg), &format!("[{}]", reg_name(reg))]);
        }
    }

    /// Computes `base + offset` into `reg` (array base addresses).
    fn lea(&mut self, reg: i32, base: i32, offset: i32) {
        if offset >= 0 && fits_arm_imm(offset) {
            self.inst(
                "add",
                &[reg_name(reg), reg_name(base), &format!("#{}", offset)],
            );
        } else if offset < 0 && fits_arm_imm(-offset) {
            self.inst(
                "sub",
                &[reg_name(reg), reg_name(base), &format!("#{}", -offset)],
            );
        } else {
            self.load_imm(reg, offset);
            self.inst("add", &[reg_name(reg), reg_name(base), reg_name(reg)]);
        }
    }

    /// Function prologue after the push: establish fp and claim the frame.
    pub fn alloc_stack(&mut self, m: &Module, fid: crate::compiler::ir::FuncId, tmp: i32) {
        self.inst("mov", &[reg_name(FP), reg_name(super::registers::SP)]);
        let size = m.func(fid).frame_size;
        if size > 0 {
            if fits_arm_imm(size) {
                self.inst(
                    "sub",
                    &[
                        reg_name(super::registers::SP),
                        reg_name(super::registers::SP),
                        &format!("#{}", size),
                    ],
                );
            } else {
                self.load_imm(tmp, size);
                self.inst(
                    "sub",
                    &[
                        reg_name(super::registers::SP),
                        reg_name(super::registers::SP),
                        reg_name(tmp),
                    ],
                );
            }
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modified_immediate_predicate() {
        assert!(fits_arm_imm(0));
        assert!(fits_arm_imm(255));
        assert!(fits_arm_imm(0x400)); // 1 rotated
        assert!(fits_arm_imm(0xff00));
        assert!(!fits_arm_imm(0x101));
        assert!(!fits_arm_imm(4095));
    }

    #[test]
    fn test_load_imm_uses_literal_pool_for_large_values() {
        let mut iloc = ILoc::new();
        iloc.load_imm(4, 5);
        iloc.load_imm(4, 123456);
        let text: Vec<String> = iloc.code().iter().map(|i| i.to_string()).collect();
        assert_eq!(text[0], "    mov r4, #5");
        assert_eq!(text[1], "    ldr r4, =123456");
    }

    #[test]
    fn test_display_forms() {
        let mut iloc = ILoc::new();
        iloc.label(".L1");
        iloc.comment("br label .L1".into());
        iloc.inst("add", &["r4", "r5", "r6"]);
        iloc.jump(".L1");
        let text: Vec<String> = iloc.code().iter().map(|i| i.to_string()).collect();
        assert_eq!(text[0], ".L1:");
        assert_eq!(text[1], "    @ br label .L1");
        assert_eq!(text[2], "    add r4, r5, r6");
        assert_eq!(text[3], "    b .L1");
    }
}
