//! # Type-Variable Registry
//!
//! Every type variable that can appear on a port is a token handed out by a
//! [`TypeVarRegistry`]. Tokens carry a display colour so that the rendering
//! layer can paint all ports sharing a variable the same way.
//!
//! ## Lifecycle
//!
//! ```text
//! allocate()  unused ──────────────► used
//! collect()   used   ──(unreachable)──► unused   (mark and sweep)
//! release()   used   ──────────────► unused     (explicit)
//! ```
//!
//! The registry starts from a fixed pool of 52 named tokens (`A`..`Z`,
//! `AA`..`AZ`). Once every pooled token is in use, numeric tokens (`0`, `1`,
//! ...) are synthesized on demand, so allocation never fails.
//!
//! Collection is driven from outside: the registry cannot see the block
//! graph, so the caller passes every live type as a root. [`GcScheduler`]
//! models the debounce that decides when a collection is due.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::ty::{Type, TypeVar};

pub const DEFAULT_FALLBACK_COLOUR: &str = "RosyBrown";

const POOL_COLOURS: [&str; 26] = [
    "Red",
    "Blue",
    "Green",
    "Cyan",
    "BlueViolet",
    "Brown",
    "Black",
    "Chartreuse",
    "Gold",
    "HotPink",
    "LightSkyBlue",
    "Orange",
    "Gray",
    "YellowGreen",
    "Maroon",
    "Purple",
    "Yellow",
    "Teal",
    "Aqua",
    "Olive",
    "Fuchsia",
    "Navy",
    "Lime",
    "Chocolate",
    "DarkSlateGray",
    "RosyBrown",
];

/// Number of tokens in the fixed pool.
pub const POOL_SIZE: usize = 2 * POOL_COLOURS.len();

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeVarEntry {
    pub name: String,
    pub colour: String,
    pub used: bool,
}

/// Outcome of one mark-and-sweep pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GcReport {
    pub live: usize,
    pub free: usize,
}

#[derive(Debug, Clone)]
pub struct TypeVarRegistry {
    entries: Vec<TypeVarEntry>,
    index: HashMap<String, usize>,
    next_synthesized: usize,
    fallback_colour: String,
}

impl TypeVarRegistry {
    pub fn new() -> Self {
        Self::with_fallback_colour(DEFAULT_FALLBACK_COLOUR)
    }

    pub fn with_fallback_colour(colour: impl Into<String>) -> Self {
        let mut registry = TypeVarRegistry {
            entries: Vec::with_capacity(POOL_SIZE),
            index: HashMap::new(),
            next_synthesized: 0,
            fallback_colour: colour.into(),
        };
        for prefix in ["", "A"] {
            for (letter, colour) in ('A'..='Z').zip(POOL_COLOURS) {
                registry.register(format!("{}{}", prefix, letter), colour.to_string(), false);
            }
        }
        registry
    }

    fn register(&mut self, name: String, colour: String, used: bool) -> usize {
        let idx = self.entries.len();
        self.index.insert(name.clone(), idx);
        self.entries.push(TypeVarEntry { name, colour, used });
        idx
    }

    /// Hands out the first unused token, synthesizing one if the pool is spent.
    pub fn allocate(&mut self) -> TypeVar {
        if let Some(entry) = self.entries.iter_mut().find(|e| !e.used) {
            entry.used = true;
            trace!(name = %entry.name, "allocated type variable");
            return TypeVar::new(entry.name.clone());
        }

        loop {
            let name = self.next_synthesized.to_string();
            self.next_synthesized += 1;
            if !self.index.contains_key(&name) {
                debug!(%name, "type variable pool exhausted, synthesized token");
                self.register(name.clone(), self.fallback_colour.clone(), true);
                return TypeVar::new(name);
            }
        }
    }

    /// Returns a token to the pool. Unknown names are ignored.
    pub fn release(&mut self, var: &TypeVar) -> bool {
        match self.index.get(var.name()) {
            Some(&idx) => {
                let was_used = self.entries[idx].used;
                self.entries[idx].used = false;
                was_used
            }
            None => false,
        }
    }

    pub fn is_used(&self, var: &TypeVar) -> bool {
        self.index
            .get(var.name())
            .is_some_and(|&idx| self.entries[idx].used)
    }

    pub fn colour_of(&self, var: &TypeVar) -> Option<&str> {
        self.index
            .get(var.name())
            .map(|&idx| self.entries[idx].colour.as_str())
    }

    pub fn entries(&self) -> &[TypeVarEntry] {
        &self.entries
    }

    pub fn used_count(&self) -> usize {
        self.entries.iter().filter(|e| e.used).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn mark_all_unused(&mut self) {
        for entry in &mut self.entries {
            entry.used = false;
        }
    }

    /// Marks a token used, adopting names this registry never issued
    /// (loaded from a saved workspace, for instance) so they are not reissued.
    pub fn mark_used(&mut self, var: &TypeVar) {
        match self.index.get(var.name()) {
            Some(&idx) => self.entries[idx].used = true,
            None => {
                let colour = self.fallback_colour.clone();
                self.register(var.name().to_string(), colour, true);
            }
        }
    }

    pub fn mark_type(&mut self, ty: &Type) {
        for var in ty.free_type_vars() {
            self.mark_used(&var);
        }
    }

    /// Mark-and-sweep over `roots`: afterwards exactly the variables that
    /// occur in some root are marked used.
    pub fn collect<'a>(&mut self, roots: impl IntoIterator<Item = &'a Type>) -> GcReport {
        self.mark_all_unused();
        for ty in roots {
            self.mark_type(ty);
        }
        let live = self.used_count();
        let report = GcReport {
            live,
            free: self.entries.len() - live,
        };
        debug!(live = report.live, free = report.free, "type variable sweep finished");
        report
    }
}

impl Default for TypeVarRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Debounced single-shot trigger for garbage collection.
///
/// Each `schedule` pushes the deadline back; the collection runs once the
/// caller polls after the deadline. Time is passed in so tests stay
/// deterministic.
#[derive(Debug, Clone)]
pub struct GcScheduler {
    delay: Duration,
    deadline: Option<Instant>,
}

impl GcScheduler {
    pub fn new(delay: Duration) -> Self {
        GcScheduler {
            delay,
            deadline: None,
        }
    }

    pub fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    /// Clears the deadline and reports whether a collection should run now.
    pub fn take_due(&mut self, now: Instant) -> bool {
        if self.is_due(now) {
            self.deadline = None;
            true
        } else {
            false
        }
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}
