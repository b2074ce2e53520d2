//! Closed class vocabulary and raw-token normalization.
//!
//! A [`ClassRegistry`] owns the ordered list of target classes (the position of a
//! class is its YOLO id), the alias table mapping vendor LaTeX tokens onto those
//! classes, and the multi-glyph function names the tokenizer folds into a single
//! symbol. Each historical dataset revision is a [`ClassSet`] selected at startup.

use std::collections::HashMap;

use crate::config::ClassSet;
use crate::error::{Error, Result};

/// The 18-class vocabulary used by the first dataset revision.
pub const BASIC_CLASSES: &[&str] = &[
    "0", "1", "2", "3", "4", "5", "6", "7", "8", "9", // digits
    "+", "-", "*", "/", "=", // operators
    "x", // variable
    "(", ")", // brackets
];

const BASIC_ALIASES: &[(&str, &str)] = &[
    ("\\frac", "/"),
    ("\\left(", "("),
    ("\\right)", ")"),
    ("\\times", "*"),
    ("\\cdot", "*"),
];

/// Function names written glyph by glyph in the vendor data.
pub const FUNCTION_NAMES: &[&str] = &[
    "sin", "cos", "tan", "sec", "csc", "cot", "ln", "log", "exp", "sqrt", "lim", "abs",
];

/// The extended vocabulary. Never reorder: ids are baked into every label file.
pub const EXTENDED_CLASSES: &[&str] = &[
    "0", "1", "2", "3", "4", "5", "6", "7", "8", "9", // digits
    "+", "-", "*", "/", "=", // operators
    "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m", // letters
    "n", "o", "p", "q", "r", "s", "t", "u", "v", "w", "x", "y", "z", //
    "(", ")", "[", "]", "|", // brackets and absolute value
    "pi", "infty", // named constants
    "sin", "cos", "tan", "sec", "csc", "cot", "ln", "log", "exp", "sqrt", "lim", "abs",
];

const EXTENDED_ALIASES: &[(&str, &str)] = &[
    ("\\frac", "/"),
    ("\\div", "/"),
    ("\\times", "*"),
    ("\\cdot", "*"),
    ("\\ast", "*"),
    ("\\left(", "("),
    ("\\right)", ")"),
    ("\\left[", "["),
    ("\\right]", "]"),
    ("\\lbrack", "["),
    ("\\rbrack", "]"),
    ("\\vert", "|"),
    ("\\lvert", "|"),
    ("\\rvert", "|"),
    ("\\mid", "|"),
    ("\\left|", "|"),
    ("\\right|", "|"),
    ("\\pi", "pi"),
    ("\\infty", "infty"),
    ("\\lim_", "lim"),
    ("\\sqrt{", "sqrt"),
];

/// A function name together with what the tokenizer needs to match it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionName {
    pub name: String,
    pub class_id: usize,
    /// Number of glyphs the name spans, one per character.
    pub glyph_len: usize,
}

/// Immutable class vocabulary with its normalization tables.
#[derive(Debug, Clone)]
pub struct ClassRegistry {
    classes: Vec<String>,
    ids: HashMap<String, usize>,
    aliases: HashMap<String, usize>,
    // Longest first.
    functions: Vec<FunctionName>,
}

impl ClassRegistry {
    /// Build the registry for one of the known dataset revisions.
    pub fn new(class_set: ClassSet) -> Result<Self> {
        match class_set {
            ClassSet::Basic => Self::from_parts(BASIC_CLASSES, BASIC_ALIASES, &[]),
            ClassSet::Extended => {
                // Every function is also reachable through its LaTeX command.
                let commands: Vec<(String, &str)> = FUNCTION_NAMES
                    .iter()
                    .map(|name| (format!("\\{}", name), *name))
                    .collect();
                let aliases: Vec<(&str, &str)> = EXTENDED_ALIASES
                    .iter()
                    .copied()
                    .chain(commands.iter().map(|(cmd, name)| (cmd.as_str(), *name)))
                    .collect();
                Self::from_parts(EXTENDED_CLASSES, &aliases, FUNCTION_NAMES)
            }
        }
    }

    /// Build a registry from explicit tables.
    ///
    /// Fails when the vocabulary is empty or contains duplicates, or when an alias
    /// target or function name is not itself a class.
    pub fn from_parts(
        classes: &[&str],
        aliases: &[(&str, &str)],
        functions: &[&str],
    ) -> Result<Self> {
        if classes.is_empty() {
            return Err(Error::EmptyVocabulary);
        }

        let mut ids = HashMap::with_capacity(classes.len());
        for (id, class) in classes.iter().enumerate() {
            if ids.insert(class.to_string(), id).is_some() {
                return Err(Error::DuplicateClass(class.to_string()));
            }
        }

        let mut alias_map = HashMap::with_capacity(aliases.len());
        for (raw, target) in aliases {
            let id = *ids
                .get(*target)
                .ok_or_else(|| Error::UnknownClass(target.to_string()))?;
            alias_map.insert(raw.to_string(), id);
        }

        let mut function_names = Vec::with_capacity(functions.len());
        for name in functions {
            let class_id = *ids
                .get(*name)
                .ok_or_else(|| Error::UnknownClass(name.to_string()))?;
            function_names.push(FunctionName {
                name: name.to_string(),
                class_id,
                glyph_len: name.chars().count(),
            });
        }
        function_names.sort_by(|a, b| b.glyph_len.cmp(&a.glyph_len));

        Ok(Self {
            classes: classes.iter().map(|c| c.to_string()).collect(),
            ids,
            aliases: alias_map,
            functions: function_names,
        })
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Class names in id order.
    pub fn class_names(&self) -> &[String] {
        &self.classes
    }

    pub fn id_of(&self, symbol: &str) -> Result<usize> {
        self.ids
            .get(symbol)
            .copied()
            .ok_or_else(|| Error::UnknownClass(symbol.to_string()))
    }

    pub fn name_of(&self, id: usize) -> Option<&str> {
        self.classes.get(id).map(String::as_str)
    }

    /// Multi-glyph function names, longest first.
    pub fn function_names(&self) -> &[FunctionName] {
        &self.functions
    }

    /// Map a raw annotation token onto a class, or `None` when it is out of scope.
    pub fn resolve(&self, raw: &str) -> Option<&str> {
        self.classify(raw).and_then(|id| self.name_of(id))
    }

    /// Same lookup as [`resolve`](Self::resolve), returning the class id.
    ///
    /// Rules apply in order: exact vocabulary membership, the alias table, then a
    /// lone lowercase letter (surrounding whitespace ignored) that is a class.
    pub fn classify(&self, raw: &str) -> Option<usize> {
        if let Some(&id) = self.ids.get(raw) {
            return Some(id);
        }
        if let Some(&id) = self.aliases.get(raw) {
            return Some(id);
        }
        let trimmed = raw.trim();
        let mut chars = trimmed.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_alphabetic() && c.is_lowercase() => {
                self.ids.get(trimmed).copied()
            }
            _ => None,
        }
    }
}
