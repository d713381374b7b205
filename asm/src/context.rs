use crate::error::Error;
use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ident {
    /// Address of a labeled instruction, rebound whenever the layout changes.
    Label,
    /// RAM address, bound once.
    Ram,
}

/// Symbol table and address cursors shared by every pass over a program.
#[derive(Debug, Default)]
pub struct Context {
    idents: IndexMap<String, (Ident, i64)>,
    instr_addr: i64,
    skip_addr: i64,
}

impl Context {
    pub fn new() -> Self {
        Context::default()
    }

    /// First binding of a label.
    pub fn add_identifier(&mut self, name: &str, addr: i64) -> Result<(), Error> {
        self.insert(name, Ident::Label, addr)
    }

    pub fn add_ram_identifier(&mut self, name: &str, addr: i64) -> Result<(), Error> {
        self.insert(name, Ident::Ram, addr)
    }

    fn insert(&mut self, name: &str, kind: Ident, addr: i64) -> Result<(), Error> {
        if self.idents.contains_key(name) {
            return Err(Error::RedefinedLabel(name.to_string()));
        }
        self.idents.insert(name.to_string(), (kind, addr));
        Ok(())
    }

    /// Rebinds an identifier that is already bound.
    pub fn set_identifier(&mut self, name: &str, addr: i64) -> Result<(), Error> {
        match self.idents.get_mut(name) {
            Some((_, val)) => {
                *val = addr;
                Ok(())
            }
            None => Err(Error::UnboundIdentifier(name.to_string())),
        }
    }

    /// Drops every label binding, RAM identifiers stay.
    pub fn clear_labels(&mut self) {
        self.idents.retain(|_, (kind, _)| *kind != Ident::Label);
    }

    pub fn get(&self, name: &str) -> Option<i64> {
        self.idents.get(name).map(|(_, val)| *val)
    }

    pub fn kind(&self, name: &str) -> Option<Ident> {
        self.idents.get(name).map(|(kind, _)| *kind)
    }

    pub fn resolve(&self, name: &str) -> Result<i64, Error> {
        self.get(name)
            .ok_or_else(|| Error::UndefinedLabel(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Ident, i64)> {
        self.idents
            .iter()
            .map(|(name, (kind, val))| (name.as_str(), *kind, *val))
    }

    pub fn set_instr_addr(&mut self, addr: i64) {
        self.instr_addr = addr;
    }

    pub fn instr_addr(&self) -> i64 {
        self.instr_addr
    }

    pub fn set_skip_addr(&mut self, addr: i64) {
        self.skip_addr = addr;
    }

    pub fn skip_addr(&self) -> i64 {
        self.skip_addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_set() {
        let mut context = Context::new();
        context.add_identifier("main", 4).unwrap();
        assert_eq!(context.get("main"), Some(4));
        context.set_identifier("main", 2).unwrap();
        assert_eq!(context.resolve("main"), Ok(2));
        assert_eq!(context.kind("main"), Some(Ident::Label));
    }

    #[test]
    fn add_twice() {
        let mut context = Context::new();
        context.add_identifier("main", 4).unwrap();
        assert_eq!(
            context.add_identifier("main", 5),
            Err(Error::RedefinedLabel("main".to_string()))
        );
        assert_eq!(
            context.add_ram_identifier("main", 0),
            Err(Error::RedefinedLabel("main".to_string()))
        );
        assert_eq!(context.get("main"), Some(4));
    }

    #[test]
    fn set_unbound() {
        let mut context = Context::new();
        assert_eq!(
            context.set_identifier("main", 0),
            Err(Error::UnboundIdentifier("main".to_string()))
        );
        assert_eq!(
            context.resolve("main"),
            Err(Error::UndefinedLabel("main".to_string()))
        );
    }

    #[test]
    fn clear_labels_keeps_ram() {
        let mut context = Context::new();
        context.add_ram_identifier("buf", 0).unwrap();
        context.add_identifier("main", 0).unwrap();
        context.clear_labels();
        assert_eq!(context.get("main"), None);
        assert_eq!(context.get("buf"), Some(0));
        context.add_identifier("main", 3).unwrap();
        let names: Vec<_> = context.iter().map(|(name, _, _)| name).collect();
        assert_eq!(names, vec!["buf", "main"]);
    }

    #[test]
    fn cursors() {
        let mut context = Context::new();
        context.set_instr_addr(7);
        context.set_skip_addr(9);
        assert_eq!(context.instr_addr(), 7);
        assert_eq!(context.skip_addr(), 9);
    }
}
