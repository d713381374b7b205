use crate::{
    context::Context,
    error::Error,
    instruction::Instruction,
    pass::Pass,
};
use arch::{Opcode, Reg};
use color_print::cformat;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::ControlFlow;

/// The instruction stream of one assembly unit together with its addressing context.
#[derive(Debug, Default)]
pub struct Program {
    prog: Vec<Instruction>,
    context: Context,
    // value -> RAM addresses to initialise with it
    data: BTreeMap<i64, Vec<i64>>,
    ram_pos: i64,
    pending_label: Option<String>,
    pending_macro_description: Option<String>,
    line_number: Option<usize>,
    // set by a completed pipeline run, cleared when code is added
    linked: bool,
}

impl Program {
    pub fn new() -> Self {
        Program::default()
    }

    /// Source line attached to the next added instruction.
    pub fn set_line_number(&mut self, line: usize) {
        self.line_number = Some(line);
    }

    pub fn add(&mut self, mut inst: Instruction) -> Result<&mut Self, Error> {
        if let Some(label) = self.pending_label.take() {
            inst.set_label(label)?;
        }
        if let Some(desc) = self.pending_macro_description.take() {
            inst.set_macro_description(desc)?;
        }
        inst.set_line_number(self.line_number.take());
        self.prog.push(inst);
        self.linked = false;
        Ok(self)
    }

    pub fn set_pending_label(&mut self, label: &str) -> Result<(), Error> {
        if let Some(pending) = &self.pending_label {
            return Err(Error::TwoLabels(label.to_string(), pending.clone()));
        }
        self.pending_label = Some(label.to_string());
        Ok(())
    }

    pub fn set_pending_macro_description(&mut self, text: &str) -> Result<(), Error> {
        if let Some(pending) = &self.pending_macro_description {
            return Err(Error::TwoMacroDescriptions(
                text.to_string(),
                pending.clone(),
            ));
        }
        self.pending_macro_description = Some(text.to_string());
        Ok(())
    }

    /// Reserves `size` words of RAM for `ident` and returns the first address.
    pub fn add_ram(&mut self, ident: &str, size: i64) -> Result<i64, Error> {
        let addr = self.ram_pos;
        let next = (size > 0)
            .then(|| addr.checked_add(size))
            .flatten()
            .ok_or_else(|| Error::InvalidRamSize(ident.to_string(), size))?;
        self.context.add_ram_identifier(ident, addr)?;
        self.ram_pos = next;
        Ok(addr)
    }

    /// Reserves one RAM word initialised with `value` at program start.
    pub fn add_data(&mut self, value: i64) {
        self.data.entry(value).or_default().push(self.ram_pos);
        self.ram_pos += 1;
        self.linked = false;
    }

    /// Visits every instruction in order with the context positioned at it.
    ///
    /// The visitor may stop the walk with `ControlFlow::Break`. An error aborts the
    /// walk and is annotated with the line of the offending instruction.
    pub fn traverse<F>(&mut self, mut visit: F) -> Result<&mut Self, Error>
    where
        F: FnMut(&mut Instruction, &mut Context) -> Result<ControlFlow<()>, Error>,
    {
        let mut addr = 0;
        for i in 0..self.prog.len() {
            let skip = self.skip_addr(addr, i);
            self.context.set_instr_addr(addr);
            self.context.set_skip_addr(skip);

            let inst = &mut self.prog[i];
            log::trace!("visit 0x{:04X} {}", addr, inst);
            match visit(inst, &mut self.context) {
                Ok(ControlFlow::Continue(())) => {}
                Ok(ControlFlow::Break(())) => break,
                Err(err) => return Err(err.at_line(inst.line_number())),
            }
            addr += inst.size();
        }
        Ok(self)
    }

    // address behind the instruction at `i` and the one following it
    fn skip_addr(&self, addr: i64, i: usize) -> i64 {
        if i + 2 < self.prog.len() {
            addr + self.prog[i].size() + self.prog[i + 1].size()
        } else {
            addr
        }
    }

    fn run(&mut self, mut pass: Pass) -> Result<&mut Self, Error> {
        log::debug!("pass: {}", pass);
        self.traverse(|inst, context| pass.visit(inst, context))
    }

    /// Prepends the initialisation of the data words: per value one load into the
    /// scratch register followed by a store to every address holding that value.
    fn append_data(&mut self) -> Result<&mut Self, Error> {
        let mut init = vec![];
        for (value, addrs) in std::mem::take(&mut self.data) {
            log::debug!("data: {} -> {:?}", value, addrs);
            init.push(Instruction::reg_const(Opcode::LDI, Reg::SCRATCH, value)?);
            for addr in addrs {
                init.push(Instruction::const_reg(Opcode::STS, addr, Reg::SCRATCH)?);
            }
        }
        self.prog.splice(0..0, init);
        Ok(self)
    }

    /// Resolves label addresses and shrinks instructions to their compact forms.
    ///
    /// Each optimization is followed by exactly one relink; the pipeline is not
    /// iterated until nothing changes anymore. On a program that is already linked
    /// and has not grown since, only the relink runs, so the layout stays as is.
    pub fn optimize_and_link(&mut self) -> Result<&mut Self, Error> {
        if let Some(label) = &self.pending_label {
            return Err(Error::DanglingLabel(label.clone()));
        }
        if let Some(desc) = &self.pending_macro_description {
            return Err(Error::DanglingMacroDescription(desc.clone()));
        }
        if self.linked {
            log::info!("already linked: {} words", self.code_size());
            return self.run(Pass::LinkSet);
        }

        log::info!(
            "optimize and link: {} instructions, {} words",
            self.prog.len(),
            self.code_size()
        );
        self.context.clear_labels();
        self.append_data()?
            .run(Pass::LinkAdd)?
            .run(Pass::OptimizeShort)?
            .run(Pass::LinkSet)?
            .run(Pass::optimize_jmp())?
            .run(Pass::LinkSet)?;
        self.linked = true;
        log::info!(
            "linked: {} instructions, {} words",
            self.prog.len(),
            self.code_size()
        );
        Ok(self)
    }

    pub fn instruction_count(&self) -> usize {
        self.prog.len()
    }

    pub fn instruction(&self, i: usize) -> Option<&Instruction> {
        self.prog.get(i)
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.prog
    }

    /// Instructions with the address the current sizes put them at.
    pub fn addresses(&self) -> impl Iterator<Item = (i64, &Instruction)> {
        self.prog.iter().scan(0, |addr, inst| {
            let at = *addr;
            *addr += inst.size();
            Some((at, inst))
        })
    }

    pub fn code_size(&self) -> i64 {
        self.prog.iter().map(|inst| inst.size()).sum()
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Colored listing for diagnostics: address, size, source line and instruction.
    pub fn listing(&self) -> String {
        let mut out = String::new();
        for (addr, inst) in self.addresses() {
            let line = inst
                .line_number()
                .map(|l| format!("{:>4}", l))
                .unwrap_or_else(|| "    ".to_string());
            out += &cformat!(
                "[{:04X}] {} | {}:   {}\n",
                addr,
                inst.size(),
                line,
                inst.cformat(&self.context)
            );
        }
        out += "-------------------+-----------------------------------------------------\n";
        out
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for inst in &self.prog {
            writeln!(f, "{}", inst)?;
        }
        Ok(())
    }
}
