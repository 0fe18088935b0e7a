use std::{cell::RefCell, collections::HashMap, fmt::Display};

/**
Stores a table of all distinct strings read from source code files.
The different IR structures in the compiler use IDs which map back to
the distinct string in the string table.

Adding a string returns the unique ID for that string. If the string
already exists in the table, then the ID already assigned to it is
returned; otherwise the string is added and a new ID is assigned.
*/
#[derive(Debug)]
pub struct StringTable {
    /// The next unique [`StringId`] which has not been assigned to a String
    next_id: RefCell<StringId>,

    /// Table mapping raw strings to their [`StringId`]s.
    table: RefCell<HashMap<String, StringId>>,

    /// Reverse table mapping [`StringId`]s back to their string values.
    reverse: RefCell<HashMap<StringId, String>>,
}

impl StringTable {
    pub fn new() -> StringTable {
        StringTable {
            next_id: RefCell::new(StringId::new()),
            table: RefCell::new(HashMap::new()),
            reverse: RefCell::new(HashMap::new()),
        }
    }

    /// Inserts a string into the table and returns the assigned ID for that
    /// string value. If the string is already in the table, then this will
    /// simply return the already assigned ID for that string.
    pub fn insert(&self, s: String) -> StringId {
        let mut table = self.table.borrow_mut();
        if let Some(id) = table.get(&s) {
            *id
        } else {
            let id = self.next_id.borrow_mut().get_and_inc();
            table.insert(s.clone(), id);
            self.reverse.borrow_mut().insert(id, s);
            id
        }
    }

    /// Given an ID, if it is assigned to a string, then return the associated
    /// string, otherwise, return None.
    pub fn get(&self, id: StringId) -> Option<String> {
        self.reverse.borrow().get(&id).cloned()
    }
}

impl Default for StringTable {
    fn default() -> Self {
        StringTable::new()
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct StringId(u32);

impl StringId {
    /// Create a new String ID and initialize it to 0
    pub fn new() -> StringId {
        StringId(0)
    }

    /// Increment by one and return the value of the ID before the increment.
    fn get_and_inc(&mut self) -> StringId {
        let old = *self;
        self.0 += 1;
        old
    }
}

impl Default for StringId {
    fn default() -> Self {
        StringId::new()
    }
}

impl Display for StringId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{}", self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_returns_same_id_for_same_string() {
        let st = StringTable::new();
        let a = st.insert("hello".into());
        let b = st.insert("world".into());
        let c = st.insert("hello".into());
        assert_eq!(a, c);
        assert_ne!(a, b);
    }

    #[test]
    fn test_get_returns_inserted_string() {
        let st = StringTable::new();
        let id = st.insert("main".into());
        assert_eq!(st.get(id), Some("main".into()));
    }
}
