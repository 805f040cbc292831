//! Textual dump of methods, loosely following smali syntax.
use std::fmt;

use crate::{symbols::SymbolTable, BlockId, InstData, InstId, Method, Reg, ValueKind};

pub struct MethodWriter<'a> {
    symbols: &'a SymbolTable,
    method: &'a Method,
}

impl<'a> MethodWriter<'a> {
    pub fn new(symbols: &'a SymbolTable, method: &'a Method) -> Self {
        Self { symbols, method }
    }

    pub fn dump_string(&self) -> String {
        self.to_string()
    }

    fn write_header(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let data = self.symbols.method(self.method.method_ref);
        writeln!(
            f,
            "method {}.{} regs={} ins={} {{",
            self.symbols.display_type(data.class),
            data.name,
            self.method.registers_size,
            self.method.ins_size
        )
    }

    fn write_block(&self, block: BlockId, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "    {block}:")?;
        for inst in self.method.layout.iter_inst(block) {
            f.write_str("        ")?;
            self.write_inst(inst, f)?;
            f.write_str("\n")?;
        }
        Ok(())
    }

    pub fn write_inst(&self, inst: InstId, f: &mut impl fmt::Write) -> fmt::Result {
        let symbols = self.symbols;
        match self.method.inst(inst) {
            InstData::Const {
                kind: ValueKind::Object,
                dest,
                ..
            } => write!(f, "const-null {dest}"),
            InstData::Const { kind, dest, imm } => {
                write!(f, "const{} {dest}, {imm}", kind.suffix())
            }
            InstData::Move { kind, dest, src } => {
                write!(f, "move{} {dest}, {src}", kind.suffix())
            }
            InstData::MoveResult { kind, dest } => {
                write!(f, "move-result{} {dest}", kind.suffix())
            }
            InstData::NewInstance { dest, ty } => {
                write!(f, "new-instance {dest}, {}", symbols.display_type(*ty))
            }
            InstData::FieldGet {
                kind,
                dest,
                obj,
                field,
            } => {
                let field = symbols.field(*field);
                write!(
                    f,
                    "iget{} {dest}, {obj}, {}.{}",
                    kind.suffix(),
                    symbols.display_type(field.class),
                    field.name
                )
            }
            InstData::FieldPut {
                kind,
                src,
                obj,
                field,
            } => {
                let field = symbols.field(*field);
                write!(
                    f,
                    "iput{} {src}, {obj}, {}.{}",
                    kind.suffix(),
                    symbols.display_type(field.class),
                    field.name
                )
            }
            InstData::Invoke { code, method, args } => {
                let method = symbols.method(*method);
                write!(f, "{code} {{")?;
                write_regs(args, f)?;
                write!(
                    f,
                    "}}, {}.{}",
                    symbols.display_type(method.class),
                    method.name
                )
            }
            InstData::Binary {
                code,
                kind,
                dest,
                args,
            } => write!(
                f,
                "{code}{} {dest}, {}, {}",
                kind.suffix(),
                args[0],
                args[1]
            ),
            InstData::Jump { dest } => write!(f, "goto {dest}"),
            InstData::Branch { code, args, dests } => {
                let z = if args.len() == 1 { "z" } else { "" };
                write!(f, "if-{code}{z} ")?;
                write_regs(args, f)?;
                write!(f, ", {}, {}", dests[0], dests[1])
            }
            InstData::Return { kind, src } => write!(f, "return{} {src}", kind.suffix()),
            InstData::ReturnVoid => f.write_str("return-void"),
        }
    }
}

impl fmt::Display for MethodWriter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.write_header(f)?;
        for block in self.method.layout.iter_block() {
            self.write_block(block, f)?;
        }
        f.write_str("}\n")
    }
}

fn write_regs(regs: &[Reg], f: &mut impl fmt::Write) -> fmt::Result {
    let mut delim = "";
    for reg in regs {
        write!(f, "{delim}{reg}")?;
        delim = ", ";
    }
    Ok(())
}
