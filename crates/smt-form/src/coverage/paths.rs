// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

use crate::error::CoverageError;
use crate::ir::{BlockId, BlockIndex, Condition, FaultKind, Form};
use std::fmt::{self, Display, Formatter};

/// How a path leaves its method
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExitKind {
    Return,
    /// Explicit throw
    Thrown,
    /// Implicit runtime fault raised at `offset`
    Fault { kind: FaultKind, offset: u32 },
    /// The path came back to a block it already passed through
    LoopBound,
}

impl Display for ExitKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ExitKind::Return => write!(f, "return"),
            ExitKind::Thrown => write!(f, "throw"),
            ExitKind::Fault { kind, offset } => write!(f, "{} at {}", kind, offset),
            ExitKind::LoopBound => write!(f, "loop-bound"),
        }
    }
}

/// Leaving `block` along its `edge`-th successor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathStep {
    pub block: BlockId,
    pub edge: usize,
}

/// Block sequence of one path through a form, before any inlining
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSkeleton {
    pub steps: Vec<PathStep>,
    pub exit: ExitKind,
}

/// Depth-first enumeration of every path from the entry block, in successor order
pub fn enumerate_paths(form: &Form, limit: usize) -> Result<Vec<PathSkeleton>, CoverageError> {
    let mut walker = Walker {
        form,
        limit,
        paths: vec![],
    };
    walker.walk(BlockId::ENTRY, &mut vec![], &mut vec![])?;
    Ok(walker.paths)
}

struct Walker<'a> {
    form: &'a Form,
    limit: usize,
    paths: Vec<PathSkeleton>,
}

impl Walker<'_> {
    fn walk(&mut self, id: BlockId, steps: &mut Vec<PathStep>, on_path: &mut Vec<BlockIndex>) -> Result<(), CoverageError> {
        let form = self.form;
        let block = form
            .block(&id)
            .ok_or_else(|| CoverageError::InvalidArgument(format!("{} has no block {}", form.method(), id)))?;
        for (edge, successor) in block.successors().iter().enumerate() {
            steps.push(PathStep { block: id, edge });
            let target = successor.target;
            match target.index {
                BlockIndex::RegularExit => self.finish(steps, ExitKind::Return)?,
                BlockIndex::ExceptionalExit => {
                    let exit = match successor.condition {
                        Condition::Exception(group) => match group.fault {
                            Some(kind) => ExitKind::Fault {
                                kind,
                                offset: group.offset,
                            },
                            None => ExitKind::Thrown,
                        },
                        _ => ExitKind::Thrown,
                    };
                    self.finish(steps, exit)?
                }
                index if target.segment == 0 && on_path.contains(&index) => self.finish(steps, ExitKind::LoopBound)?,
                index => {
                    let entering = target.segment == 0;
                    if entering {
                        on_path.push(index);
                    }
                    self.walk(target, steps, on_path)?;
                    if entering {
                        on_path.pop();
                    }
                }
            }
            steps.pop();
        }
        Ok(())
    }

    fn finish(&mut self, steps: &[PathStep], exit: ExitKind) -> Result<(), CoverageError> {
        if self.paths.len() >= self.limit {
            return Err(CoverageError::PathLimitExceeded {
                method: self.form.method().clone(),
                limit: self.limit,
            });
        }
        self.paths.push(PathSkeleton {
            steps: steps.to_vec(),
            exit,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use method_graph::{MethodRef, TypeRef};

    #[test]
    fn empty_forms_have_one_returning_path() {
        let method = MethodRef::new_static(TypeRef::named("Demo", "C"), "Nop", vec![], TypeRef::Void);
        let paths = enumerate_paths(&Form::empty(method), 8).unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].exit, ExitKind::Return);
        assert_eq!(paths[0].steps, vec![PathStep { block: BlockId::ENTRY, edge: 0 }]);
    }

    #[test]
    fn limit_counts_completed_paths() {
        let method = MethodRef::new_static(TypeRef::named("Demo", "C"), "Nop", vec![], TypeRef::Void);
        let err = enumerate_paths(&Form::empty(method.clone()), 0).unwrap_err();
        assert_eq!(err, CoverageError::PathLimitExceeded { method, limit: 0 });
    }
}
