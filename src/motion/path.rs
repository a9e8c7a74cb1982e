//! Path files: a header line followed by `x<TAB>y` rows in arena millimetres

use crate::core::types::Point;
use crate::error::{DishaError, Result};
use std::fs;
use std::path::Path;

pub fn load_path(path: &Path) -> Result<Vec<Point>> {
    let content = fs::read_to_string(path)
        .map_err(|e| DishaError::PathFile(format!("cannot read {:?}: {}", path, e)))?;
    parse_path(&content)
}

pub fn parse_path(content: &str) -> Result<Vec<Point>> {
    if content.is_empty() {
        return Err(DishaError::PathFile("file is empty".to_string()));
    }

    let mut points = Vec::new();
    for (index, line) in content.lines().enumerate().skip(1) {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let &[x, y] = tokens.as_slice() else {
            return Err(DishaError::PathFile(format!(
                "line {}: expected two values, got {:?}",
                index + 1,
                line
            )));
        };
        points.push(Point::new(coordinate(x, index)?, coordinate(y, index)?));
    }
    Ok(points)
}

fn coordinate(token: &str, index: usize) -> Result<i32> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DishaError::PathFile(format!(
            "line {}: {:?} is not a non-negative integer",
            index + 1,
            token
        )));
    }
    token
        .parse()
        .map_err(|_| DishaError::PathFile(format!("line {}: {:?} is out of range", index + 1, token)))
}
