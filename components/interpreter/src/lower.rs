//! Call hoisting
//!
//! Statements are stored with call-free expressions. Before a statement is
//! appended, every `Call` inside it becomes a [`Stmt::Call`] writing a
//! temporary, and every operand evaluated before that call is first saved
//! with [`Stmt::Eval`], so operands are still evaluated left to right.
//! Conditions that are evaluated lazily (`else if` arms, loop conditions)
//! get their own blocks so the hoisted calls run only when the condition
//! would have been evaluated.

use std::mem;

use crate::code::{BlockId, Expr, Program, Stmt};

impl Program {
    /// Append `stmt` to `block`, hoisting calls out of its expressions
    pub fn emit(&mut self, block: BlockId, stmt: Stmt) {
        match stmt {
            Stmt::If {
                condition,
                body,
                chain,
                last,
            } => self.emit_if(block, condition, body, chain, last),
            Stmt::Loop {
                condition: Some(condition),
                body,
            } if condition.has_call() => {
                // Loop forever, re-checking the condition at the top of
                // every iteration and breaking once it fails.
                let guarded = self.new_block();
                let exit = self.new_block();
                self.blocks[exit].push(Stmt::Break);
                self.emit_if(guarded, condition, body, Vec::new(), Some(exit));
                self.blocks[block].push(Stmt::Loop {
                    condition: None,
                    body: guarded,
                });
            }
            mut stmt => {
                self.lower_all(block, statement_operands(&mut stmt));
                self.blocks[block].push(stmt);
            }
        }
    }

    fn emit_if(
        &mut self,
        block: BlockId,
        mut condition: Expr,
        body: BlockId,
        mut chain: Vec<(Expr, BlockId)>,
        last: Option<BlockId>,
    ) {
        self.lower(block, &mut condition);
        let split = chain.iter().position(|(condition, _)| condition.has_call());
        let last = match split {
            Some(split) => {
                let mut rest = chain.split_off(split);
                let (next, next_body) = rest.remove(0);
                let otherwise = self.new_block();
                self.emit_if(otherwise, next, next_body, rest, last);
                Some(otherwise)
            }
            None => last,
        };
        self.blocks[block].push(Stmt::If {
            condition,
            body,
            chain,
            last,
        });
    }

    fn temp(&mut self) -> usize {
        self.temps += 1;
        self.temps - 1
    }

    /// Make `expr` call-free, emitting the hoisted work into `block`
    fn lower(&mut self, block: BlockId, expr: &mut Expr) {
        if !expr.has_call() {
            return;
        }
        self.lower_all(block, expr.operands_mut());
        if let Expr::Call(label, arguments) = expr {
            let slot = self.temp();
            self.blocks[block].push(Stmt::Call {
                slot,
                label: *label,
                arguments: mem::take(arguments),
            });
            *expr = Expr::Temp(slot);
        }
    }

    /// Lower operands evaluated in order. Operands before the last one
    /// containing a call are saved to temporaries; later ones stay inline.
    fn lower_all(&mut self, block: BlockId, operands: Vec<&mut Expr>) {
        let Some(last) = operands.iter().rposition(|operand| operand.has_call()) else {
            return;
        };
        for (i, operand) in operands.into_iter().take(last + 1).enumerate() {
            self.lower(block, operand);
            if i < last && !operand.is_constant() {
                let slot = self.temp();
                let value = mem::replace(operand, Expr::Temp(slot));
                self.blocks[block].push(Stmt::Eval(slot, value));
            }
        }
    }
}

/// Expressions a statement evaluates, in order
fn statement_operands(stmt: &mut Stmt) -> Vec<&mut Expr> {
    match stmt {
        Stmt::Var(_, a)
        | Stmt::Set(_, a)
        | Stmt::Discard(a)
        | Stmt::Throw(a)
        | Stmt::Delete(_, a)
        | Stmt::Eval(_, a)
        | Stmt::Each { array: a, .. }
        | Stmt::If { condition: a, .. } => vec![a],
        Stmt::Loop { condition, .. } | Stmt::Return(condition) => condition.iter_mut().collect(),
        Stmt::JumpTo(_, arguments) | Stmt::Call { arguments, .. } => arguments.iter_mut().collect(),
        Stmt::Seek(stream, amount) => {
            let mut operands: Vec<&mut Expr> = stream.iter_mut().collect();
            operands.push(amount);
            operands
        }
        Stmt::Change(a, b) | Stmt::Remove(a, b) => vec![a, b],
        Stmt::Mutate(a, b, c) | Stmt::Insert(a, b, c) | Stmt::Modify(a, b, c) => vec![a, b, c],
        Stmt::Break => Vec::new(),
    }
}
