// src/vm/instruction_list.rs
//! Ordered instruction queues
//!
//! Every queue in the VM (a realm's pending list, each lane's queue, the
//! runner's per-realm batches) is an [`InstructionList`]. Lists own their
//! instructions, so moving between lists is moving values.

use crate::vm::instruction::Instruction;
use std::collections::{vec_deque, VecDeque};

/// FIFO of owned instructions
#[derive(Debug, Default)]
pub struct InstructionList {
    queue: VecDeque<Instruction>,
}

impl InstructionList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_back(&mut self, instruction: Instruction) {
        self.queue.push_back(instruction);
    }

    pub fn pop_front(&mut self) -> Option<Instruction> {
        self.queue.pop_front()
    }

    /// Return an instruction to the head, ahead of everything queued
    pub(crate) fn push_front(&mut self, instruction: Instruction) {
        self.queue.push_front(instruction);
    }

    /// Move every element out in order, leaving `self` empty
    pub fn detach_all(&mut self) -> InstructionList {
        std::mem::take(self)
    }

    /// Move every element of `other` onto the tail, leaving `other` empty
    pub fn append_list(&mut self, other: &mut InstructionList) {
        if self.queue.is_empty() {
            std::mem::swap(&mut self.queue, &mut other.queue);
        } else {
            self.queue.append(&mut other.queue);
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn front(&self) -> Option<&Instruction> {
        self.queue.front()
    }

    pub fn iter(&self) -> vec_deque::Iter<'_, Instruction> {
        self.queue.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> vec_deque::IterMut<'_, Instruction> {
        self.queue.iter_mut()
    }
}

impl IntoIterator for InstructionList {
    type Item = Instruction;
    type IntoIter = vec_deque::IntoIter<Instruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.queue.into_iter()
    }
}

impl<'a> IntoIterator for &'a InstructionList {
    type Item = &'a Instruction;
    type IntoIter = vec_deque::Iter<'a, Instruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.queue.iter()
    }
}

impl FromIterator<Instruction> for InstructionList {
    fn from_iter<I: IntoIterator<Item = Instruction>>(iter: I) -> Self {
        Self {
            queue: iter.into_iter().collect(),
        }
    }
}

impl Extend<Instruction> for InstructionList {
    fn extend<I: IntoIterator<Item = Instruction>>(&mut self, iter: I) {
        self.queue.extend(iter);
    }
}
