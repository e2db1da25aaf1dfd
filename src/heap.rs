use crate::error::{Error, Result};
use crate::value::{PairId, Value};

/// A single cons cell on the heap.
pub struct ConsCell {
    pub car: Value,
    pub cdr: Value,
}

/// The cons cell arena. All pairs are allocated here; PairId is an index
/// into `cells`. Aliased PairIds see mutation immediately, and cyclic
/// structure is representable. Cells live until the machine is dropped.
pub struct Heap {
    cells: Vec<ConsCell>,
}

impl Heap {
    pub fn new() -> Self {
        Heap {
            cells: Vec::with_capacity(1024),
        }
    }

    /// Allocate a new cons cell.
    pub fn alloc(&mut self, car: Value, cdr: Value) -> PairId {
        let id = PairId(self.cells.len() as u32);
        self.cells.push(ConsCell { car, cdr });
        id
    }

    /// Allocate and wrap in a Value in one step.
    pub fn cons(&mut self, car: Value, cdr: Value) -> Value {
        Value::Pair(self.alloc(car, cdr))
    }

    #[inline]
    pub fn car(&self, id: PairId) -> Value {
        self.cells[id.0 as usize].car.clone()
    }

    #[inline]
    pub fn cdr(&self, id: PairId) -> Value {
        self.cells[id.0 as usize].cdr.clone()
    }

    /// Rebind the head of an existing pair in place (set-car!).
    #[inline]
    pub fn set_car(&mut self, id: PairId, val: Value) {
        self.cells[id.0 as usize].car = val;
    }

    /// Rebind the tail of an existing pair in place (set-cdr!).
    #[inline]
    pub fn set_cdr(&mut self, id: PairId, val: Value) {
        self.cells[id.0 as usize].cdr = val;
    }

    /// car of a value, failing on non-pairs. Never coerces to Nil.
    pub fn car_val(&self, val: &Value) -> Result<Value> {
        match val {
            Value::Pair(id) => Ok(self.car(*id)),
            _ => Err(Error::NotAPair("car of a non-pair".into())),
        }
    }

    /// cdr of a value, failing on non-pairs.
    pub fn cdr_val(&self, val: &Value) -> Result<Value> {
        match val {
            Value::Pair(id) => Ok(self.cdr(*id)),
            _ => Err(Error::NotAPair("cdr of a non-pair".into())),
        }
    }

    /// Build a proper list from a slice of values.
    pub fn list(&mut self, values: &[Value]) -> Value {
        let mut result = Value::Nil;
        for val in values.iter().rev() {
            result = self.cons(val.clone(), result);
        }
        result
    }

    /// Collect a proper list into a Vec. Fails on an improper tail.
    pub fn list_to_vec(&self, val: &Value) -> Result<Vec<Value>> {
        let mut result = Vec::new();
        let mut current = val.clone();
        loop {
            match current {
                Value::Nil => return Ok(result),
                Value::Pair(id) => {
                    result.push(self.car(id));
                    current = self.cdr(id);
                }
                _ => return Err(Error::NotAPair("expected a proper list".into())),
            }
        }
    }

    /// Collect a possibly-improper list, returning the elements of the pair
    /// chain and the non-Nil tail if there was one.
    pub fn improper_list_to_vec(&self, val: &Value) -> (Vec<Value>, Option<Value>) {
        let mut result = Vec::new();
        let mut current = val.clone();
        loop {
            match current {
                Value::Nil => return (result, None),
                Value::Pair(id) => {
                    result.push(self.car(id));
                    current = self.cdr(id);
                }
                tail => return (result, Some(tail)),
            }
        }
    }

    /// Number of cells allocated so far.
    pub fn total_cells(&self) -> usize {
        self.cells.len()
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}
