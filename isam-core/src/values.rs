use crate::{CameraPose, Error, PoseTangent, Result, Symbol};
use nalgebra::{Point3, Vector3};
use std::collections::BTreeMap;

/// The value of a single variable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Pose(CameraPose),
    Point(Point3<f64>),
}

/// A mapping from variable symbols to their current values.
///
/// The same container serves two roles: the pending initial guesses of one
/// incremental batch, and the persistent estimate store inside the
/// estimator. In both roles the insert-once rule holds - a symbol receives
/// its value exactly once per container, and the value category must match
/// the symbol category. Iteration order is the symbol order, which makes
/// printing, column ordering, and exports deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Values {
    map: BTreeMap<Symbol, Value>,
}

impl Values {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn contains(&self, symbol: Symbol) -> bool {
        self.map.contains_key(&symbol)
    }

    /// Discards every value. Used to reset a pending batch after it has
    /// been committed.
    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Inserts the initial guess for a pose variable.
    pub fn insert_pose(&mut self, symbol: Symbol, pose: CameraPose) -> Result<()> {
        if !symbol.is_pose() {
            return Err(Error::CategoryMismatch(symbol));
        }
        self.insert(symbol, Value::Pose(pose))
    }

    /// Inserts the initial guess for a landmark variable.
    pub fn insert_point(&mut self, symbol: Symbol, point: Point3<f64>) -> Result<()> {
        if !symbol.is_landmark() {
            return Err(Error::CategoryMismatch(symbol));
        }
        self.insert(symbol, Value::Point(point))
    }

    fn insert(&mut self, symbol: Symbol, value: Value) -> Result<()> {
        if self.map.contains_key(&symbol) {
            return Err(Error::DuplicateVariable(symbol));
        }
        self.map.insert(symbol, value);
        Ok(())
    }

    /// Moves every value of `other` into `self`, rejecting overlap.
    pub fn merge(&mut self, other: Values) -> Result<()> {
        for &symbol in other.map.keys() {
            if self.map.contains_key(&symbol) {
                return Err(Error::DuplicateVariable(symbol));
            }
        }
        self.map.extend(other.map);
        Ok(())
    }

    /// The current value of a pose variable.
    pub fn pose(&self, symbol: Symbol) -> Result<CameraPose> {
        match self.map.get(&symbol) {
            Some(Value::Pose(pose)) => Ok(*pose),
            Some(Value::Point(_)) => Err(Error::CategoryMismatch(symbol)),
            None => Err(Error::UnknownVariable(symbol)),
        }
    }

    /// The current value of a landmark variable.
    pub fn point(&self, symbol: Symbol) -> Result<Point3<f64>> {
        match self.map.get(&symbol) {
            Some(Value::Point(point)) => Ok(*point),
            Some(Value::Pose(_)) => Err(Error::CategoryMismatch(symbol)),
            None => Err(Error::UnknownVariable(symbol)),
        }
    }

    /// Applies a tangent-chart update to a pose variable.
    pub fn retract_pose(&mut self, symbol: Symbol, delta: &PoseTangent) -> Result<()> {
        let pose = self.pose(symbol)?;
        self.map.insert(symbol, Value::Pose(pose.retract(delta)));
        Ok(())
    }

    /// Moves a landmark variable by a world-space delta.
    pub fn retract_point(&mut self, symbol: Symbol, delta: &Vector3<f64>) -> Result<()> {
        let point = self.point(symbol)?;
        self.map.insert(symbol, Value::Point(point + delta));
        Ok(())
    }

    /// Every symbol in order.
    pub fn symbols(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.map.keys().copied()
    }

    /// Every variable and its value in symbol order.
    pub fn iter(&self) -> impl Iterator<Item = (Symbol, &Value)> {
        self.map.iter().map(|(&symbol, value)| (symbol, value))
    }

    /// Every pose variable in symbol order.
    pub fn poses(&self) -> impl Iterator<Item = (Symbol, CameraPose)> + '_ {
        self.map.iter().filter_map(|(&symbol, value)| match value {
            Value::Pose(pose) => Some((symbol, *pose)),
            Value::Point(_) => None,
        })
    }

    /// Every landmark variable in symbol order.
    pub fn points(&self) -> impl Iterator<Item = (Symbol, Point3<f64>)> + '_ {
        self.map.iter().filter_map(|(&symbol, value)| match value {
            Value::Point(point) => Some((symbol, *point)),
            Value::Pose(_) => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut values = Values::new();
        values
            .insert_pose(Symbol::Pose(0), CameraPose::identity())
            .unwrap();
        assert_eq!(
            values.insert_pose(Symbol::Pose(0), CameraPose::identity()),
            Err(Error::DuplicateVariable(Symbol::Pose(0)))
        );
    }

    #[test]
    fn category_mismatch_is_rejected() {
        let mut values = Values::new();
        assert_eq!(
            values.insert_point(Symbol::Pose(0), Point3::origin()),
            Err(Error::CategoryMismatch(Symbol::Pose(0)))
        );
        values
            .insert_pose(Symbol::Pose(0), CameraPose::identity())
            .unwrap();
        assert_eq!(
            values.point(Symbol::Pose(0)),
            Err(Error::CategoryMismatch(Symbol::Pose(0)))
        );
    }

    #[test]
    fn unknown_variable_is_reported() {
        let values = Values::new();
        assert_eq!(
            values.pose(Symbol::Pose(3)),
            Err(Error::UnknownVariable(Symbol::Pose(3)))
        );
    }

    #[test]
    fn merge_rejects_overlap_without_mutating() {
        let mut a = Values::new();
        a.insert_pose(Symbol::Pose(0), CameraPose::identity()).unwrap();
        let mut b = Values::new();
        b.insert_pose(Symbol::Pose(0), CameraPose::identity()).unwrap();
        b.insert_point(Symbol::Landmark(0), Point3::origin()).unwrap();
        assert_eq!(
            a.clone().merge(b),
            Err(Error::DuplicateVariable(Symbol::Pose(0)))
        );
        assert_eq!(a.len(), 1);
    }

    #[test]
    fn iteration_is_in_symbol_order() {
        let mut values = Values::new();
        values.insert_point(Symbol::Landmark(1), Point3::origin()).unwrap();
        values.insert_pose(Symbol::Pose(1), CameraPose::identity()).unwrap();
        values.insert_pose(Symbol::Pose(0), CameraPose::identity()).unwrap();
        let symbols: Vec<Symbol> = values.symbols().collect();
        assert_eq!(
            symbols,
            vec![Symbol::Pose(0), Symbol::Pose(1), Symbol::Landmark(1)]
        );
    }
}
