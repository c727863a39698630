//! C1 — the taint flag set.
//!
//! A `FlagSet` is a packed `u32`. Every security category occupies an
//! adjacent bit pair `(YES, EXEC)`: the `EXEC` bit of a category always sits
//! one position above its `YES` bit, so `execToYes`/`yesToExec` are a single
//! shared shift-and-mask (see [`FlagSet::exec_to_yes`]/[`FlagSet::yes_to_exec`]).
//! Meta-bits occupy the high bits above all category pairs and are never
//! touched by the exec/yes conversions.

use std::ops::{BitAnd, BitOr, BitOrAssign};

/// The named security categories, in bit-pair order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Html,
    Sql,
    Shell,
    Serialize,
    Custom1,
    Custom2,
    Misc,
    SqlNumkey,
    Escaped,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Html,
        Category::Sql,
        Category::Shell,
        Category::Serialize,
        Category::Custom1,
        Category::Custom2,
        Category::Misc,
        Category::SqlNumkey,
        Category::Escaped,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Category::Html => "html",
            Category::Sql => "sql",
            Category::Shell => "shell",
            Category::Serialize => "serialize",
            Category::Custom1 => "custom1",
            Category::Custom2 => "custom2",
            Category::Misc => "misc",
            Category::SqlNumkey => "sql_numkey",
            Category::Escaped => "escaped",
        }
    }

    pub fn from_name(name: &str) -> Option<Category> {
        Category::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Bit index of this category's `YES` bit. The `EXEC` bit is always `yes_bit + 1`.
    const fn yes_bit(self) -> u32 {
        self as u32 * 2
    }
}

/// All category bits (YES and EXEC) packed together; meta-bits start above this.
const CATEGORY_BITS: u32 = (Category::ALL.len() as u32) * 2;
const CATEGORY_MASK: u32 = (1 << CATEGORY_BITS) - 1;

macro_rules! meta_bit {
    ($n:expr) => {
        1 << (CATEGORY_BITS + $n)
    };
}

/// Packed bitfield: category YES/EXEC pairs plus meta-bits. See module docs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct FlagSet(u32);

impl FlagSet {
    pub const EMPTY: FlagSet = FlagSet(0);

    // Meta-bits: not categories, they modify semantics (§3.1).
    pub const INAPPLICABLE: FlagSet = FlagSet(meta_bit!(0));
    pub const UNKNOWN: FlagSet = FlagSet(meta_bit!(1));
    pub const PRESERVE: FlagSet = FlagSet(meta_bit!(2));
    pub const NO_OVERRIDE: FlagSet = FlagSet(meta_bit!(3));
    pub const RAW_PARAM: FlagSet = FlagSet(meta_bit!(4));
    pub const ARRAY_OK: FlagSet = FlagSet(meta_bit!(5));

    pub const fn empty() -> FlagSet {
        FlagSet(0)
    }

    pub const fn from_bits(bits: u32) -> FlagSet {
        FlagSet(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn yes(category: Category) -> FlagSet {
        FlagSet(1 << category.yes_bit())
    }

    pub const fn exec(category: Category) -> FlagSet {
        FlagSet(1 << (category.yes_bit() + 1))
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: FlagSet) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: FlagSet) -> bool {
        self.0 & other.0 != 0
    }

    pub fn has_category_yes(self, category: Category) -> bool {
        self.intersects(FlagSet::yes(category))
    }

    pub fn has_category_exec(self, category: Category) -> bool {
        self.intersects(FlagSet::exec(category))
    }

    pub fn insert(&mut self, other: FlagSet) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: FlagSet) {
        self.0 &= !other.0;
    }

    pub fn union(self, other: FlagSet) -> FlagSet {
        FlagSet(self.0 | other.0)
    }

    pub fn intersection(self, other: FlagSet) -> FlagSet {
        FlagSet(self.0 & other.0)
    }

    pub fn difference(self, other: FlagSet) -> FlagSet {
        FlagSet(self.0 & !other.0)
    }

    /// Only the category YES/EXEC bits, meta-bits stripped.
    pub fn category_bits(self) -> FlagSet {
        FlagSet(self.0 & CATEGORY_MASK)
    }

    /// Only the meta-bits, category bits stripped.
    pub fn meta_bits(self) -> FlagSet {
        FlagSet(self.0 & !CATEGORY_MASK)
    }

    /// `execToYes` (§4.1): every `EXEC` bit becomes the matching `YES` bit of
    /// a brand-new result; no `EXEC` bits survive. Nilpotent: applying it to
    /// its own output yields [`FlagSet::EMPTY`], because the output carries
    /// no `EXEC` bits to shift down a second time.
    pub fn exec_to_yes(self) -> FlagSet {
        let exec_bits = self.0 & category_exec_mask();
        FlagSet((exec_bits >> 1) & category_yes_mask())
    }

    /// `yesToExec` (§4.1): the mirror image of [`Self::exec_to_yes`].
    pub fn yes_to_exec(self) -> FlagSet {
        let yes_bits = self.0 & category_yes_mask();
        FlagSet((yes_bits << 1) & category_exec_mask())
    }

    /// Enforce the `SQL_NUMKEY ⇒ SQL` invariant (§3.1) by adding `SQL` (and
    /// `SQL_EXEC` if `SQL_NUMKEY_EXEC` is present) wherever the numkey bit is set.
    pub fn normalize(mut self) -> FlagSet {
        if self.has_category_yes(Category::SqlNumkey) {
            self.insert(FlagSet::yes(Category::Sql));
        }
        if self.has_category_exec(Category::SqlNumkey) {
            self.insert(FlagSet::exec(Category::Sql));
        }
        self
    }

    pub fn iter_yes_categories(self) -> impl Iterator<Item = Category> {
        Category::ALL.into_iter().filter(move |&c| self.has_category_yes(c))
    }

    pub fn iter_exec_categories(self) -> impl Iterator<Item = Category> {
        Category::ALL.into_iter().filter(move |&c| self.has_category_exec(c))
    }
}

const fn category_yes_mask() -> u32 {
    let mut mask = 0u32;
    let mut i = 0;
    while i < Category::ALL.len() {
        mask |= 1 << (i as u32 * 2);
        i += 1;
    }
    mask
}

const fn category_exec_mask() -> u32 {
    category_yes_mask() << 1
}

impl BitOr for FlagSet {
    type Output = FlagSet;
    fn bitor(self, rhs: FlagSet) -> FlagSet {
        self.union(rhs)
    }
}

impl BitOrAssign for FlagSet {
    fn bitor_assign(&mut self, rhs: FlagSet) {
        self.insert(rhs);
    }
}

impl BitAnd for FlagSet {
    type Output = FlagSet;
    fn bitand(self, rhs: FlagSet) -> FlagSet {
        self.intersection(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exec_and_yes_bits_are_adjacent() {
        assert_eq!(FlagSet::exec(Category::Html).bits(), FlagSet::yes(Category::Html).bits() << 1);
    }

    #[test]
    fn exec_to_yes_is_nilpotent() {
        let t = FlagSet::exec(Category::Html) | FlagSet::exec(Category::Sql);
        let once = t.exec_to_yes();
        assert_eq!(once, FlagSet::yes(Category::Html) | FlagSet::yes(Category::Sql));
        assert_eq!(once.exec_to_yes(), FlagSet::EMPTY);
    }

    #[test]
    fn yes_to_exec_is_nilpotent() {
        let t = FlagSet::yes(Category::Shell);
        let once = t.yes_to_exec();
        assert_eq!(once, FlagSet::exec(Category::Shell));
        assert_eq!(once.yes_to_exec(), FlagSet::EMPTY);
    }

    #[test]
    fn normalize_enforces_numkey_implies_sql() {
        let t = FlagSet::yes(Category::SqlNumkey).normalize();
        assert!(t.has_category_yes(Category::Sql));
    }

    #[test]
    fn meta_bits_survive_category_conversions() {
        let t = FlagSet::exec(Category::Html) | FlagSet::UNKNOWN;
        assert_eq!(t.exec_to_yes().meta_bits(), FlagSet::EMPTY);
        assert!(t.meta_bits().contains(FlagSet::UNKNOWN));
    }
}
