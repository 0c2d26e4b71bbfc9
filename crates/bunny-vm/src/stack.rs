use std::rc::Rc;

use bunny_core::{BunnyError, Closure, Environment, Result, Value};

/// One slot of the shared operand stack.
#[derive(Debug, Clone, Default)]
pub enum Slot {
    #[default]
    Empty,
    Value(Value),
    Env(Rc<Environment>),
    Int(usize),
}

/// The engine's operand and frame stack. Slots are addressed by absolute
/// index; reads of the wrong kind are internal errors.
pub struct Stack {
    slots: Vec<Slot>,
}

impl Stack {
    pub fn new(size: usize) -> Self {
        Stack {
            slots: vec![Slot::Empty; size],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Grow to hold at least `needed` slots, in large steps.
    pub fn maybe_grow(&mut self, needed: usize, limit: usize) -> Result<()> {
        let len = self.slots.len();
        if needed <= len {
            return Ok(());
        }
        if needed > limit {
            return Err(BunnyError::resource_exhausted(format!(
                "stack of {needed} slots exceeds limit of {limit}"
            )));
        }
        let grown = (needed + 32).max(len + len.div_ceil(2)).min(limit);
        self.slots.resize(grown, Slot::Empty);
        Ok(())
    }

    /// Drop everything and go back to `size` empty slots.
    pub fn reset(&mut self, size: usize) {
        self.slots.clear();
        self.slots.resize(size, Slot::Empty);
    }

    pub fn set(&mut self, index: usize, slot: Slot) -> Result<()> {
        match self.slots.get_mut(index) {
            Some(s) => {
                *s = slot;
                Ok(())
            }
            None => Err(BunnyError::invalid_state(format!(
                "stack write at {index} beyond {}",
                self.slots.len()
            ))),
        }
    }

    fn get(&self, index: usize) -> Result<&Slot> {
        self.slots.get(index).ok_or_else(|| {
            BunnyError::invalid_state(format!(
                "stack read at {index} beyond {}",
                self.slots.len()
            ))
        })
    }

    pub fn value(&self, index: usize) -> Result<&Value> {
        match self.get(index)? {
            Slot::Value(v) => Ok(v),
            other => Err(wrong_kind("value", index, other)),
        }
    }

    pub fn values(&self, from: usize, to: usize) -> Result<Vec<Value>> {
        (from..to).map(|i| self.value(i).cloned()).collect()
    }

    pub fn closure(&self, index: usize) -> Result<Rc<Closure>> {
        match self.value(index)? {
            Value::Closure(c) => Ok(c.clone()),
            other => Err(BunnyError::invalid_state(format!(
                "expected closure at {index}, found {}",
                other.type_name()
            ))),
        }
    }

    pub fn env(&self, index: usize) -> Result<Rc<Environment>> {
        match self.get(index)? {
            Slot::Env(e) => Ok(e.clone()),
            other => Err(wrong_kind("environment", index, other)),
        }
    }

    pub fn int(&self, index: usize) -> Result<usize> {
        match self.get(index)? {
            Slot::Int(n) => Ok(*n),
            other => Err(wrong_kind("integer", index, other)),
        }
    }
}

fn wrong_kind(expected: &str, index: usize, found: &Slot) -> BunnyError {
    let found = match found {
        Slot::Empty => "empty",
        Slot::Value(_) => "value",
        Slot::Env(_) => "environment",
        Slot::Int(_) => "integer",
    };
    BunnyError::invalid_state(format!("expected {expected} at stack slot {index}, found {found}"))
}
