//! Assembly document model
//!
//! Translation appends into an [`Assembly`] value and the final text is
//! produced in one rendering pass. Keeping the document structured until the
//! end lets debug comments ride along and be filtered out at render time.

use std::fmt::Write;

use crate::mips::registers::Reg;

/// One `.data` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataDirective {
    /// `.space n` bytes, zero-initialized by the loader
    Space(u32),
    /// `.word w0, w1, ...`
    Words(Vec<i32>),
}

#[derive(Debug, Clone)]
pub struct DataEntry {
    pub label: String,
    pub directive: DataDirective,
}

/// One instruction operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AsmOp {
    Reg(Reg),
    Imm(i32),
    Label(String),
    /// `off($reg)` addressing
    Offset(Reg, i32),
}

impl std::fmt::Display for AsmOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AsmOp::Reg(r) => write!(f, "{}", r),
            AsmOp::Imm(v) => write!(f, "{}", v),
            AsmOp::Label(l) => f.write_str(l),
            AsmOp::Offset(r, off) => write!(f, "{}({})", off, r),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AsmInst {
    pub op: &'static str,
    pub args: Vec<AsmOp>,
}

#[derive(Debug, Clone)]
pub enum TextLine {
    Label(String),
    Inst(AsmInst),
    Comment(String),
}

/// The whole output program.
#[derive(Debug, Default)]
pub struct Assembly {
    pub data: Vec<DataEntry>,
    pub text: Vec<TextLine>,
}

impl Assembly {
    pub fn new() -> Assembly {
        Assembly::default()
    }

    pub fn data(&mut self, label: impl Into<String>, directive: DataDirective) {
        self.data.push(DataEntry {
            label: label.into(),
            directive,
        });
    }

    pub fn label(&mut self, label: impl Into<String>) {
        self.text.push(TextLine::Label(label.into()));
    }

    pub fn inst(&mut self, op: &'static str, args: Vec<AsmOp>) {
        self.text.push(TextLine::Inst(AsmInst { op, args }));
    }

    pub fn comment(&mut self, text: impl Into<String>) {
        self.text.push(TextLine::Comment(text.into()));
    }

    /// Render the final program text. The startup stub points `$ra` at the
    /// terminating label, so `main` returning ends the run.
    pub fn render(&self, debug: bool) -> String {
        let mut out = String::new();
        out.push_str(".data\n");
        for entry in &self.data {
            match &entry.directive {
                DataDirective::Space(bytes) => {
                    let _ = writeln!(out, "{}: .space {}", entry.label, bytes);
                }
                DataDirective::Words(words) => {
                    let words: Vec<String> = words.iter().map(|w| w.to_string()).collect();
                    let _ = writeln!(out, "{}: .word {}", entry.label, words.join(", "));
                }
            }
        }
        out.push('\n');
        out.push_str(".text\n");
        out.push_str("\tla     $ra, end.end\n");
        out.push_str("\tj      main\n");
        for line in &self.text {
            match line {
                TextLine::Label(label) => {
                    let _ = writeln!(out, "{}:", label);
                }
                TextLine::Inst(inst) => {
                    if inst.args.is_empty() {
                        let _ = writeln!(out, "\t{}", inst.op);
                    } else {
                        let args: Vec<String> = inst.args.iter().map(|a| a.to_string()).collect();
                        let _ = writeln!(out, "\t{:<6} {}", inst.op, args.join(", "));
                    }
                }
                TextLine::Comment(text) => {
                    if debug {
                        let _ = writeln!(out, "\t# {}", text);
                    }
                }
            }
        }
        out.push_str("end.end:\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_layout() {
        let mut asm = Assembly::new();
        asm.data("g", DataDirective::Words(vec![1, 2]));
        asm.data("buf", DataDirective::Space(16));
        asm.label("main");
        asm.comment("the answer");
        asm.inst("li", vec![AsmOp::Reg(Reg::V0), AsmOp::Imm(42)]);
        asm.inst("jr", vec![AsmOp::Reg(Reg::Ra)]);

        let text = asm.render(false);
        assert!(text.starts_with(".data\ng: .word 1, 2\nbuf: .space 16\n"));
        assert!(text.contains("\tla     $ra, end.end\n\tj      main\n"));
        assert!(text.contains("main:\n\tli     $v0, 42\n\tjr     $ra\n"));
        assert!(text.ends_with("end.end:\n"));
        assert!(!text.contains("the answer"));

        let debug = asm.render(true);
        assert!(debug.contains("\t# the answer\n"));
    }

    #[test]
    fn test_offset_operand_format() {
        assert_eq!(AsmOp::Offset(Reg::Sp, 8).to_string(), "8($sp)");
        assert_eq!(AsmOp::Offset(Reg::Sp, -4).to_string(), "-4($sp)");
    }

    #[test]
    fn test_zero_arg_instruction() {
        let mut asm = Assembly::new();
        asm.inst("syscall", vec![]);
        assert!(asm.render(false).contains("\tsyscall\n"));
    }
}
