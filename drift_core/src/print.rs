//! Serialization of the abstract program to concrete source text.

use crate::{
    prog::{
        AssignStmt, CallExpr, DeclStmt, Expr, IfStmt, Lit, LitKind, LoopStmt, Program, Receiver,
        Stmt, TryStmt, VarIdent, FuncKind, PRIMARY_CLASS, RUNTIME_FIELD, RUNTIME_INTERFACE,
    },
    ty::{PrimKind, TypeId},
    TOOL_VERSION,
};
use chrono::{DateTime, Local};
use std::fmt::{self, Display};

/// Header comment data; the format is stable for downstream tooling.
#[derive(Debug, Clone)]
pub struct Header {
    pub seed: u64,
    pub timestamp: DateTime<Local>,
    /// Extra `// `-prefixed lines, e.g. the reduction summary.
    pub extra: Vec<String>,
}

impl Header {
    pub fn new(seed: u64, timestamp: DateTime<Local>) -> Self {
        Self {
            seed,
            timestamp,
            extra: Vec::new(),
        }
    }
}

impl Program {
    /// Source text without a header comment; byte-identical for a given
    /// (seed, config).
    pub fn display(&self) -> ProgDisplay<'_> {
        ProgDisplay {
            prog: self,
            header: None,
        }
    }

    pub fn display_with_header<'a>(&'a self, header: &'a Header) -> ProgDisplay<'a> {
        ProgDisplay {
            prog: self,
            header: Some(header),
        }
    }
}

pub struct ProgDisplay<'a> {
    prog: &'a Program,
    header: Option<&'a Header>,
}

impl Display for ProgDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut p = Printer {
            prog: self.prog,
            out: f,
            indent: 0,
            in_primary: false,
        };
        p.write_program(self.header)
    }
}

struct Printer<'a, 'f, 'g> {
    prog: &'a Program,
    out: &'f mut fmt::Formatter<'g>,
    indent: usize,
    in_primary: bool,
}

impl<'a> Printer<'a, '_, '_> {
    fn write_program(&mut self, header: Option<&Header>) -> fmt::Result {
        let prog = self.prog;
        if let Some(h) = header {
            writeln!(
                self.out,
                "// Generated by drift v{} on {}",
                TOOL_VERSION,
                h.timestamp.format("%Y-%m-%d %H:%M:%S")
            )?;
            writeln!(self.out, "// Seed: {}", h.seed)?;
            for line in &h.extra {
                writeln!(self.out, "// {}", line)?;
            }
        }

        let declared: Vec<TypeId> = prog.universe.declared_types().map(|t| t.id()).collect();
        for id in declared {
            if prog.universe.ty_of(id).as_interface().is_some() {
                self.write_interface(id)?;
            } else {
                self.write_aggregate(id)?;
            }
        }
        self.write_primary_class()
    }

    fn write_interface(&mut self, id: TypeId) -> fmt::Result {
        let prog = self.prog;
        writeln!(self.out, "public interface {}", prog.universe.ty_of(id).name())?;
        writeln!(self.out, "{{")?;
        for m in prog.interface_methods.iter().filter(|m| m.iface == id) {
            write!(self.out, "    ")?;
            self.write_signature(m.ret, &m.name, &m.params)?;
            writeln!(self.out, ";")?;
        }
        writeln!(self.out, "}}")
    }

    fn write_aggregate(&mut self, id: TypeId) -> fmt::Result {
        let prog = self.prog;
        let s = prog.universe.ty_of(id).checked_as_struct();
        let keyword = if s.is_class() { "class" } else { "struct" };
        write!(self.out, "public {} {}", keyword, s.name())?;
        let implemented: Vec<&str> = s
            .implements()
            .iter()
            .filter(|&&i| !prog.universe.is_removed(i))
            .map(|&i| prog.universe.ty_of(i).name())
            .collect();
        if !implemented.is_empty() {
            write!(self.out, " : {}", implemented.join(", "))?;
        }
        writeln!(self.out)?;
        writeln!(self.out, "{{")?;
        for f in s.fields() {
            writeln!(
                self.out,
                "    public {} {};",
                prog.universe.ty_of(f.ty).name(),
                f.name
            )?;
        }
        if !s.fields().is_empty() {
            let params = s
                .fields()
                .iter()
                .map(|f| {
                    format!(
                        "{} {}",
                        prog.universe.ty_of(f.ty).name(),
                        f.name.to_lowercase()
                    )
                })
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(self.out, "    public {}({})", s.name(), params)?;
            writeln!(self.out, "    {{")?;
            for f in s.fields() {
                writeln!(self.out, "        {} = {};", f.name, f.name.to_lowercase())?;
            }
            writeln!(self.out, "    }}")?;
        }

        self.in_primary = false;
        self.indent = 1;
        for idx in 0..prog.funcs.len() {
            if matches!(prog.funcs[idx].kind, FuncKind::Instance { on, .. } if on == id) {
                self.write_func(idx, "public ")?;
            }
        }
        self.indent = 0;
        writeln!(self.out, "}}")
    }

    fn write_primary_class(&mut self) -> fmt::Result {
        let prog = self.prog;
        writeln!(self.out, "public class {}", PRIMARY_CLASS)?;
        writeln!(self.out, "{{")?;
        self.in_primary = true;
        if prog.uses_runtime {
            writeln!(
                self.out,
                "    public static {} {};",
                RUNTIME_INTERFACE, RUNTIME_FIELD
            )?;
        }
        for field in &prog.statics {
            write!(
                self.out,
                "    public static {} {} = ",
                prog.universe.ty_of(field.var.ty).name(),
                field.var.name
            )?;
            self.write_expr(&field.init, false)?;
            writeln!(self.out, ";")?;
        }

        self.indent = 1;
        let entry_idx = prog.funcs.iter().position(|f| f.is_entry).unwrap();
        self.write_entry(entry_idx)?;
        for idx in 0..prog.funcs.len() {
            let func = &prog.funcs[idx];
            if func.is_entry || !matches!(func.kind, FuncKind::Static) {
                continue;
            }
            self.write_func(idx, "public static ")?;
        }
        self.indent = 0;
        writeln!(self.out, "}}")
    }

    fn write_entry(&mut self, idx: usize) -> fmt::Result {
        let prog = self.prog;
        let func = &prog.funcs[idx];
        if prog.uses_runtime {
            writeln!(
                self.out,
                "    public static void Main({} rt)",
                RUNTIME_INTERFACE
            )?;
        } else {
            writeln!(self.out, "    public static void Main()")?;
        }
        writeln!(self.out, "    {{")?;
        self.indent = 2;
        if prog.uses_runtime {
            self.write_indent()?;
            writeln!(self.out, "{} = rt;", RUNTIME_FIELD)?;
        }
        for stmt in &func.body {
            self.write_stmt(stmt)?;
        }
        self.indent = 1;
        writeln!(self.out, "    }}")
    }

    fn write_signature(
        &mut self,
        ret: Option<TypeId>,
        name: &str,
        params: &[VarIdent],
    ) -> fmt::Result {
        let prog = self.prog;
        match ret {
            None => write!(self.out, "void {}(", name)?,
            Some(r) => write!(self.out, "{} {}(", prog.universe.ty_of(r).name(), name)?,
        }
        for (i, p) in params.iter().enumerate() {
            if i != 0 {
                write!(self.out, ", ")?;
            }
            write!(self.out, "{} {}", prog.universe.ty_of(p.ty).name(), p.name)?;
        }
        write!(self.out, ")")
    }

    fn write_func(&mut self, idx: usize, modifiers: &str) -> fmt::Result {
        let prog = self.prog;
        let func = &prog.funcs[idx];
        self.write_indent()?;
        write!(self.out, "{}", modifiers)?;
        self.write_signature(func.ret, &func.name, &func.params)?;
        writeln!(self.out)?;
        self.write_indent()?;
        writeln!(self.out, "{{")?;
        self.indent += 1;
        for stmt in &func.body {
            self.write_stmt(stmt)?;
        }
        self.indent -= 1;
        self.write_indent()?;
        writeln!(self.out, "}}")
    }

    fn write_indent(&mut self) -> fmt::Result {
        for _ in 0..self.indent {
            write!(self.out, "    ")?;
        }
        Ok(())
    }

    fn write_block(&mut self, stmts: &'a [Stmt]) -> fmt::Result {
        self.write_indent()?;
        writeln!(self.out, "{{")?;
        self.indent += 1;
        for s in stmts {
            self.write_stmt(s)?;
        }
        self.indent -= 1;
        self.write_indent()?;
        writeln!(self.out, "}}")
    }

    fn write_stmt(&mut self, stmt: &'a Stmt) -> fmt::Result {
        match stmt {
            Stmt::Block(stmts) => self.write_block(stmts),
            Stmt::Decl(DeclStmt { name, ty, init }) => {
                self.write_indent()?;
                write!(self.out, "{} {}", self.prog.universe.ty_of(*ty).name(), name)?;
                if let Some(init) = init {
                    write!(self.out, " = ")?;
                    self.write_expr(init, false)?;
                }
                writeln!(self.out, ";")
            }
            Stmt::Assign(AssignStmt { lhs, op, rhs }) => {
                self.write_indent()?;
                self.write_expr(lhs, false)?;
                write!(self.out, " {} ", op.token())?;
                self.write_expr(rhs, false)?;
                writeln!(self.out, ";")
            }
            Stmt::Expr(e) => {
                self.write_indent()?;
                self.write_expr(e, false)?;
                writeln!(self.out, ";")
            }
            Stmt::If(IfStmt { cond, then, els }) => {
                self.write_indent()?;
                write!(self.out, "if (")?;
                self.write_expr(cond, false)?;
                writeln!(self.out, ")")?;
                self.write_block(then)?;
                if let Some(els) = els {
                    self.write_indent()?;
                    writeln!(self.out, "else")?;
                    self.write_block(els)?;
                }
                Ok(())
            }
            Stmt::Return(value) => {
                self.write_indent()?;
                match value {
                    None => writeln!(self.out, "return;"),
                    Some(e) => {
                        write!(self.out, "return ")?;
                        self.write_expr(e, false)?;
                        writeln!(self.out, ";")
                    }
                }
            }
            Stmt::TryFinally(TryStmt { body, finally }) => {
                self.write_indent()?;
                writeln!(self.out, "try")?;
                self.write_block(body)?;
                self.write_indent()?;
                writeln!(self.out, "finally")?;
                self.write_block(finally)
            }
            Stmt::Loop(LoopStmt { var, bound, body }) => {
                self.write_indent()?;
                writeln!(
                    self.out,
                    "for (int {v} = 0; {v} < {b}; {v}++)",
                    v = var,
                    b = bound
                )?;
                self.write_block(body)
            }
        }
    }

    /// `operand` requests parentheses around anything that could change
    /// meaning when nested under another operator.
    fn write_expr(&mut self, expr: &'a Expr, operand: bool) -> fmt::Result {
        let needs_parens = operand && !is_atom(expr);
        if needs_parens {
            write!(self.out, "(")?;
        }
        match expr {
            Expr::Lit(lit) => self.write_lit(lit)?,
            Expr::Var(name) => write!(self.out, "{}", name)?,
            Expr::StaticRef(name) => {
                if self.in_primary {
                    write!(self.out, "{}", name)?;
                } else {
                    write!(self.out, "{}.{}", PRIMARY_CLASS, name)?;
                }
            }
            Expr::This => write!(self.out, "this")?,
            Expr::Field(base, name) => {
                self.write_expr(base, true)?;
                write!(self.out, ".{}", name)?;
            }
            Expr::Index(base, indices) => {
                self.write_expr(base, true)?;
                write!(self.out, "[")?;
                for (i, idx) in indices.iter().enumerate() {
                    if i != 0 {
                        write!(self.out, ", ")?;
                    }
                    self.write_expr(idx, false)?;
                }
                write!(self.out, "]")?;
            }
            Expr::Unary(op, e) => {
                write!(self.out, "{}", op.token())?;
                self.write_expr(e, true)?;
            }
            Expr::Binary(op, l, r) => {
                self.write_expr(l, true)?;
                write!(self.out, " {} ", op.token())?;
                self.write_expr(r, true)?;
            }
            Expr::Cast(ty, e) => {
                write!(self.out, "({})(", self.prog.universe.ty_of(*ty).name())?;
                self.write_expr(e, false)?;
                write!(self.out, ")")?;
            }
            Expr::Call(call) => self.write_call(call)?,
            Expr::New(ty, args) => {
                write!(self.out, "new {}(", self.prog.universe.ty_of(*ty).name())?;
                for (i, a) in args.iter().enumerate() {
                    if i != 0 {
                        write!(self.out, ", ")?;
                    }
                    self.write_expr(a, false)?;
                }
                write!(self.out, ")")?;
            }
            Expr::NewArray(ty, elems) => {
                let rank = self.prog.universe.ty_of(*ty).checked_as_array().rank();
                write!(self.out, "new {} {{ ", self.prog.universe.ty_of(*ty).name())?;
                if rank == 2 {
                    write!(self.out, "{{ ")?;
                }
                for (i, e) in elems.iter().enumerate() {
                    if i != 0 {
                        write!(self.out, ", ")?;
                    }
                    self.write_expr(e, false)?;
                }
                if rank == 2 {
                    write!(self.out, " }}")?;
                }
                write!(self.out, " }}")?;
            }
            Expr::IncDec {
                target,
                inc,
                prefix,
            } => {
                let tok = if *inc { "++" } else { "--" };
                if *prefix {
                    write!(self.out, "{}", tok)?;
                    self.write_expr(target, true)?;
                } else {
                    self.write_expr(target, true)?;
                    write!(self.out, "{}", tok)?;
                }
            }
            Expr::Ref(e) => {
                write!(self.out, "ref ")?;
                self.write_expr(e, false)?;
            }
            Expr::Checksum { site, value } => {
                if self.in_primary {
                    write!(self.out, "{}.Checksum(\"{}\", ", RUNTIME_FIELD, site)?;
                } else {
                    write!(
                        self.out,
                        "{}.{}.Checksum(\"{}\", ",
                        PRIMARY_CLASS, RUNTIME_FIELD, site
                    )?;
                }
                self.write_expr(value, false)?;
                write!(self.out, ")")?;
            }
            Expr::ConsoleWrite(value) => {
                write!(self.out, "System.Console.WriteLine(")?;
                self.write_expr(value, false)?;
                write!(self.out, ")")?;
            }
        }
        if needs_parens {
            write!(self.out, ")")?;
        }
        Ok(())
    }

    fn write_call(&mut self, call: &'a CallExpr) -> fmt::Result {
        match &call.receiver {
            Receiver::None => {}
            Receiver::PrimaryClass => write!(self.out, "{}.", PRIMARY_CLASS)?,
            Receiver::Expr(recv) => {
                self.write_expr(recv, true)?;
                write!(self.out, ".")?;
            }
        }
        write!(self.out, "{}(", call.callee)?;
        for (i, a) in call.args.iter().enumerate() {
            if i != 0 {
                write!(self.out, ", ")?;
            }
            self.write_expr(a, false)?;
        }
        write!(self.out, ")")
    }

    fn write_lit(&mut self, lit: &Lit) -> fmt::Result {
        let prim = self.prog.universe.ty_of(lit.ty).prim_kind();
        match (&lit.kind, prim) {
            (LitKind::Bool(b), _) => write!(self.out, "{}", b),
            (LitKind::Char(c), _) => write!(self.out, "(char){}", c),
            (LitKind::Int(v), Some(PrimKind::Int)) if *v == i32::MIN as i128 => {
                write!(self.out, "int.MinValue")
            }
            (LitKind::Int(v), Some(PrimKind::Long)) if *v == i64::MIN as i128 => {
                write!(self.out, "long.MinValue")
            }
            (LitKind::Int(v), Some(PrimKind::UInt)) => write!(self.out, "{}U", v),
            (LitKind::Int(v), Some(PrimKind::Long)) => write!(self.out, "{}L", v),
            (LitKind::Int(v), Some(PrimKind::ULong)) => write!(self.out, "{}UL", v),
            (LitKind::Int(v), _) => write!(self.out, "{}", v),
            (LitKind::Float(v), Some(PrimKind::Float)) => write!(self.out, "{:?}f", *v as f32),
            (LitKind::Float(v), _) => write!(self.out, "{:?}d", v),
            (LitKind::Default, _) => write!(
                self.out,
                "default({})",
                self.prog.universe.ty_of(lit.ty).name()
            ),
        }
    }
}

/// Atoms never need parentheses in operand position.
fn is_atom(expr: &Expr) -> bool {
    match expr {
        Expr::Var(_) | Expr::StaticRef(_) | Expr::This | Expr::Field(..) | Expr::Index(..) => true,
        Expr::Call(_) | Expr::New(..) | Expr::NewArray(..) => true,
        Expr::Checksum { .. } | Expr::ConsoleWrite(_) => true,
        Expr::Lit(lit) => match &lit.kind {
            LitKind::Int(v) => *v >= 0,
            LitKind::Float(v) => *v >= 0.0,
            LitKind::Char(_) => false,
            _ => true,
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenConfig;

    #[test]
    fn same_seed_prints_identically() {
        let a = crate::gen::gen_program(1019, &GenConfig::default(), true);
        let b = crate::gen::gen_program(1019, &GenConfig::default(), true);
        assert_eq!(a.display().to_string(), b.display().to_string());
    }

    #[test]
    fn printed_program_has_primary_class_shape() {
        let p = crate::gen::gen_program(7, &GenConfig::default(), true);
        let src = p.display().to_string();
        assert!(src.contains("public class Program"));
        assert!(src.contains("public static IRuntime s_rt;"));
        assert!(src.contains("public static void Main(IRuntime rt)"));
        assert!(src.contains("s_rt = rt;"));
        assert!(src.contains("M0();"));
    }

    #[test]
    fn header_records_version_and_seed() {
        let p = crate::gen::gen_program(7, &GenConfig::default(), true);
        let header = Header::new(7, Local::now());
        let src = p.display_with_header(&header).to_string();
        let first = src.lines().next().unwrap();
        assert!(first.starts_with("// Generated by drift v"));
        assert_eq!(src.lines().nth(1).unwrap(), "// Seed: 7");
    }

    #[test]
    fn checksum_disabled_drops_runtime_plumbing() {
        let p = crate::gen::gen_program(7, &GenConfig::default(), false);
        let src = p.display().to_string();
        assert!(!src.contains("s_rt"));
        assert!(src.contains("public static void Main()"));
    }
}
