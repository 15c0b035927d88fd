//! The animation data section: a small stack-machine bytecode followed by
//! per-sprite step sequences.
//!
//! On disk, operands of the comparison/arithmetic/sprite opcodes arrive
//! as separate PushToStack instructions. The parser first decodes the
//! stream flat, then a folding pass absorbs each opcode's trailing pushes
//! into its operand list, so the in-memory form reads like a normal
//! instruction list. Jump targets are byte offsets in the file and become
//! symbolic labels in memory; serialization recomputes every offset in a
//! width pass before emitting, since labels may point forward.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Cursor;

use log::error;

use crate::binary_utils::{read_u8, read_u16_le, remaining, write_u16_le};
use crate::error::{AssetError, Result};

const OP_PUSH: u8 = 0x01;
const OP_SCENE_START: u8 = 0x05;
const OP_COMPARE_EQUAL: u8 = 0x06;
const OP_COMPARE_ORDER: u8 = 0x07;
const OP_ADD: u8 = 0x08;
const OP_SUBTRACT: u8 = 0x09;
const OP_JUMP: u8 = 0x0A;
const OP_JUMP_IF_TRUE: u8 = 0x0B;
const OP_JUMP_IF_FALSE: u8 = 0x0C;
const OP_SETUP_SPRITE: u8 = 0x0D;
const OP_REMOVE_SPRITE: u8 = 0x0E;
const OP_WAIT_FRAME: u8 = 0x10;
const OP_END: u8 = 0x14;

const ORDER_LESS: u8 = 0x00;
const ORDER_GREATER: u8 = 0x01;

const STEP_END_SEQUENCE: u8 = 0x00;
const STEP_SET_IMAGE: u8 = 0x01;
const STEP_MOVE: u8 = 0x02;
const STEP_WAIT: u8 = 0x03;
const STEP_JUMP_IF_COUNTER: u8 = 0x04;
const STEP_SET_POSITION: u8 = 0x05;
const STEP_SET_COUNTER: u8 = 0x06;

/// Trailing bytes after the last labelled sequence are treated as
/// alignment padding once this few remain.
const PADDING_WINDOW: usize = 15;

/// A stack-machine instruction with its pushes already folded in. Jump
/// and sprite-sequence operands are label ids into the script's label
/// tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    SceneStart,
    End,
    /// A push that no later opcode consumed.
    PushToStack(u16),
    Jump { target: usize },
    JumpIfTrue { target: usize },
    JumpIfFalse { target: usize },
    CompareEqual { lhs: u16, rhs: u16 },
    CompareLess { lhs: u16, rhs: u16 },
    CompareGreater { lhs: u16, rhs: u16 },
    Add { lhs: u16, rhs: u16 },
    Subtract { lhs: u16, rhs: u16 },
    SetupSprite { sprite: u16, x: u16, y: u16, sequence: usize },
    RemoveSprite { sprite: u16 },
    WaitFrame,
}

impl Instruction {
    /// Encoded byte width, pushes re-expanded.
    fn encoded_len(&self) -> usize {
        match self {
            Instruction::SceneStart | Instruction::End | Instruction::WaitFrame => 1,
            Instruction::PushToStack(_) => 3,
            Instruction::Jump { .. }
            | Instruction::JumpIfTrue { .. }
            | Instruction::JumpIfFalse { .. } => 3,
            Instruction::CompareEqual { .. }
            | Instruction::Add { .. }
            | Instruction::Subtract { .. } => 7,
            Instruction::CompareLess { .. } | Instruction::CompareGreater { .. } => 8,
            Instruction::SetupSprite { .. } => 13,
            Instruction::RemoveSprite { .. } => 4,
        }
    }

    fn consumes_stack(&self) -> bool {
        matches!(
            self,
            Instruction::CompareEqual { .. }
                | Instruction::CompareLess { .. }
                | Instruction::CompareGreater { .. }
                | Instruction::Add { .. }
                | Instruction::Subtract { .. }
                | Instruction::SetupSprite { .. }
                | Instruction::RemoveSprite { .. }
        )
    }
}

/// A per-sprite animation step. `JumpIfCounter` carries a data label id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    EndSequence,
    SetImage(u8),
    Move { dx: i8, dy: i8 },
    Wait(u8),
    JumpIfCounter { target: usize },
    SetPosition { x: u16, y: u16 },
    SetCounter(u8),
}

impl Step {
    fn encoded_len(&self) -> usize {
        match self {
            Step::EndSequence => 1,
            Step::SetImage(_) | Step::Wait(_) | Step::SetCounter(_) => 2,
            Step::Move { .. } | Step::JumpIfCounter { .. } => 3,
            Step::SetPosition { .. } => 5,
        }
    }
}

/// Parsed data section. The label tables map label ids to instruction or
/// step indices; `None` marks a label whose target offset matched nothing
/// (logged at parse time, emitted as offset 0 on write).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub instructions: Vec<Instruction>,
    pub steps: Vec<Step>,
    pub instruction_labels: Vec<Option<usize>>,
    pub data_labels: Vec<Option<usize>>,
}

/// One folded instruction with the byte span it came from. For a folded
/// group the span starts at the first consumed push.
struct Spanned {
    offset: usize,
    end: usize,
    instr: Instruction,
}

fn fold_pushes(
    list: &mut Vec<Spanned>,
    op: &'static str,
    needed: usize,
) -> Result<(usize, Vec<u16>)> {
    let found = list
        .iter()
        .rev()
        .take_while(|item| matches!(item.instr, Instruction::PushToStack(_)))
        .count();
    if found < needed {
        return Err(AssetError::MissingStackParameters { op, needed, found });
    }
    let tail = list.split_off(list.len() - needed);
    let group_offset = tail[0].offset;
    let values = tail
        .iter()
        .filter_map(|item| match item.instr {
            Instruction::PushToStack(v) => Some(v),
            _ => None,
        })
        .collect();
    Ok((group_offset, values))
}

impl Script {
    /// Parse a complete data section (the bytes after the slot-table
    /// images, padding included).
    pub fn parse(data: &[u8]) -> Result<Script> {
        let first = data.first().copied().unwrap_or(0);
        if first != OP_SCENE_START {
            return Err(AssetError::MissingSceneStart(first));
        }

        let mut cursor = Cursor::new(data);
        let mut folded: Vec<Spanned> = Vec::new();
        let mut data_targets: BTreeSet<usize> = BTreeSet::new();

        loop {
            let offset = cursor.position() as usize;
            let opcode = read_u8(&mut cursor)?;
            let instr = match opcode {
                OP_PUSH => Instruction::PushToStack(read_u16_le(&mut cursor)?),
                OP_SCENE_START => Instruction::SceneStart,
                OP_COMPARE_EQUAL => {
                    let (off, v) = fold_pushes(&mut folded, "CompareEqual", 2)?;
                    folded.push(Spanned {
                        offset: off,
                        end: cursor.position() as usize,
                        instr: Instruction::CompareEqual { lhs: v[0], rhs: v[1] },
                    });
                    continue;
                }
                OP_COMPARE_ORDER => {
                    let selector = read_u8(&mut cursor)?;
                    let (off, v) = match selector {
                        ORDER_LESS => fold_pushes(&mut folded, "CompareLess", 2)?,
                        ORDER_GREATER => fold_pushes(&mut folded, "CompareGreater", 2)?,
                        _ => {
                            return Err(AssetError::ContradictoryOpcode {
                                bytes: vec![opcode, selector],
                                offset,
                            })
                        }
                    };
                    let instr = if selector == ORDER_LESS {
                        Instruction::CompareLess { lhs: v[0], rhs: v[1] }
                    } else {
                        Instruction::CompareGreater { lhs: v[0], rhs: v[1] }
                    };
                    folded.push(Spanned {
                        offset: off,
                        end: cursor.position() as usize,
                        instr,
                    });
                    continue;
                }
                OP_ADD => {
                    let (off, v) = fold_pushes(&mut folded, "Add", 2)?;
                    folded.push(Spanned {
                        offset: off,
                        end: cursor.position() as usize,
                        instr: Instruction::Add { lhs: v[0], rhs: v[1] },
                    });
                    continue;
                }
                OP_SUBTRACT => {
                    let (off, v) = fold_pushes(&mut folded, "Subtract", 2)?;
                    folded.push(Spanned {
                        offset: off,
                        end: cursor.position() as usize,
                        instr: Instruction::Subtract { lhs: v[0], rhs: v[1] },
                    });
                    continue;
                }
                OP_JUMP => Instruction::Jump {
                    target: read_u16_le(&mut cursor)? as usize,
                },
                OP_JUMP_IF_TRUE => Instruction::JumpIfTrue {
                    target: read_u16_le(&mut cursor)? as usize,
                },
                OP_JUMP_IF_FALSE => Instruction::JumpIfFalse {
                    target: read_u16_le(&mut cursor)? as usize,
                },
                OP_SETUP_SPRITE => {
                    let (off, v) = fold_pushes(&mut folded, "SetupSprite", 4)?;
                    data_targets.insert(v[3] as usize);
                    folded.push(Spanned {
                        offset: off,
                        end: cursor.position() as usize,
                        instr: Instruction::SetupSprite {
                            sprite: v[0],
                            x: v[1],
                            y: v[2],
                            sequence: v[3] as usize,
                        },
                    });
                    continue;
                }
                OP_REMOVE_SPRITE => {
                    let (off, v) = fold_pushes(&mut folded, "RemoveSprite", 1)?;
                    folded.push(Spanned {
                        offset: off,
                        end: cursor.position() as usize,
                        instr: Instruction::RemoveSprite { sprite: v[0] },
                    });
                    continue;
                }
                OP_WAIT_FRAME => Instruction::WaitFrame,
                OP_END => Instruction::End,
                _ => return Err(AssetError::UnknownOpcode { opcode, offset }),
            };
            let is_end = matches!(instr, Instruction::End);
            folded.push(Spanned {
                offset,
                end: cursor.position() as usize,
                instr,
            });
            if is_end {
                // Consecutive terminators are each their own instruction.
                while data.get(cursor.position() as usize) == Some(&OP_END) {
                    let offset = cursor.position() as usize;
                    read_u8(&mut cursor)?;
                    folded.push(Spanned {
                        offset,
                        end: cursor.position() as usize,
                        instr: Instruction::End,
                    });
                }
                break;
            }
        }

        let (steps, step_offsets) = parse_steps(&mut cursor, &mut data_targets)?;

        // Instruction label ids, assigned in offset order.
        let instr_targets: BTreeSet<usize> = folded
            .iter()
            .filter_map(|item| match item.instr {
                Instruction::Jump { target }
                | Instruction::JumpIfTrue { target }
                | Instruction::JumpIfFalse { target } => Some(target),
                _ => None,
            })
            .collect();
        let instr_label_ids: BTreeMap<usize, usize> = instr_targets
            .iter()
            .enumerate()
            .map(|(id, &off)| (off, id))
            .collect();
        let data_label_ids: BTreeMap<usize, usize> = data_targets
            .iter()
            .enumerate()
            .map(|(id, &off)| (off, id))
            .collect();

        // Resolve instruction labels against parse offsets. A target
        // inside a folded group (past its first push) cannot be honoured.
        let offset_to_index: BTreeMap<usize, usize> = folded
            .iter()
            .enumerate()
            .map(|(idx, item)| (item.offset, idx))
            .collect();
        let mut instruction_labels = vec![None; instr_label_ids.len()];
        for (&target, &id) in &instr_label_ids {
            if let Some(&idx) = offset_to_index.get(&target) {
                instruction_labels[id] = Some(idx);
                continue;
            }
            if let Some((_, &idx)) = offset_to_index.range(..target).next_back() {
                let span = &folded[idx];
                if target < span.end && span.instr.consumes_stack() {
                    return Err(AssetError::LabelInsideFold(target));
                }
            }
            error!("jump target at data offset {} matches no instruction", target);
        }

        let mut data_labels = vec![None; data_label_ids.len()];
        for (&target, &id) in &data_label_ids {
            if let Some(&idx) = step_offsets.get(&target) {
                data_labels[id] = Some(idx);
            } else {
                error!("data label at offset {} matches no step", target);
            }
        }

        // Swap raw byte offsets for label ids.
        let mut instructions: Vec<Instruction> =
            folded.into_iter().map(|item| item.instr).collect();
        for instr in &mut instructions {
            match instr {
                Instruction::Jump { target }
                | Instruction::JumpIfTrue { target }
                | Instruction::JumpIfFalse { target } => {
                    *target = instr_label_ids[target];
                }
                Instruction::SetupSprite { sequence, .. } => {
                    *sequence = data_label_ids[sequence];
                }
                _ => {}
            }
        }
        let mut steps = steps;
        for step in &mut steps {
            if let Step::JumpIfCounter { target } = step {
                *target = data_label_ids[target];
            }
        }

        Ok(Script {
            instructions,
            steps,
            instruction_labels,
            data_labels,
        })
    }

    /// Serialize back to data-section bytes, padded to a 16-byte multiple.
    pub fn to_bytes(&self) -> Vec<u8> {
        // Width pass: labels may point forward, so every offset must be
        // known before any operand is emitted.
        let mut instr_offsets = Vec::with_capacity(self.instructions.len());
        let mut pos = 0usize;
        for instr in &self.instructions {
            instr_offsets.push(pos);
            pos += instr.encoded_len();
        }
        let mut step_offsets = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            step_offsets.push(pos);
            pos += step.encoded_len();
        }

        let instr_label_offset = |id: usize| -> u16 {
            match self.instruction_labels.get(id).copied().flatten() {
                Some(idx) => instr_offsets[idx] as u16,
                None => {
                    error!("jump label {} is unresolved, writing offset 0", id);
                    0
                }
            }
        };
        let data_label_offset = |id: usize| -> u16 {
            match self.data_labels.get(id).copied().flatten() {
                Some(idx) => step_offsets[idx] as u16,
                None => {
                    error!("data label {} is unresolved, writing offset 0", id);
                    0
                }
            }
        };
        let push = |out: &mut Vec<u8>, value: u16| {
            out.push(OP_PUSH);
            write_u16_le(out, value);
        };

        let mut out = Vec::with_capacity((pos + 15) / 16 * 16);
        for instr in &self.instructions {
            match *instr {
                Instruction::SceneStart => out.push(OP_SCENE_START),
                Instruction::End => out.push(OP_END),
                Instruction::WaitFrame => out.push(OP_WAIT_FRAME),
                Instruction::PushToStack(value) => push(&mut out, value),
                Instruction::Jump { target } => {
                    out.push(OP_JUMP);
                    write_u16_le(&mut out, instr_label_offset(target));
                }
                Instruction::JumpIfTrue { target } => {
                    out.push(OP_JUMP_IF_TRUE);
                    write_u16_le(&mut out, instr_label_offset(target));
                }
                Instruction::JumpIfFalse { target } => {
                    out.push(OP_JUMP_IF_FALSE);
                    write_u16_le(&mut out, instr_label_offset(target));
                }
                Instruction::CompareEqual { lhs, rhs } => {
                    push(&mut out, lhs);
                    push(&mut out, rhs);
                    out.push(OP_COMPARE_EQUAL);
                }
                Instruction::CompareLess { lhs, rhs } => {
                    push(&mut out, lhs);
                    push(&mut out, rhs);
                    out.push(OP_COMPARE_ORDER);
                    out.push(ORDER_LESS);
                }
                Instruction::CompareGreater { lhs, rhs } => {
                    push(&mut out, lhs);
                    push(&mut out, rhs);
                    out.push(OP_COMPARE_ORDER);
                    out.push(ORDER_GREATER);
                }
                Instruction::Add { lhs, rhs } => {
                    push(&mut out, lhs);
                    push(&mut out, rhs);
                    out.push(OP_ADD);
                }
                Instruction::Subtract { lhs, rhs } => {
                    push(&mut out, lhs);
                    push(&mut out, rhs);
                    out.push(OP_SUBTRACT);
                }
                Instruction::SetupSprite { sprite, x, y, sequence } => {
                    push(&mut out, sprite);
                    push(&mut out, x);
                    push(&mut out, y);
                    push(&mut out, data_label_offset(sequence));
                    out.push(OP_SETUP_SPRITE);
                }
                Instruction::RemoveSprite { sprite } => {
                    push(&mut out, sprite);
                    out.push(OP_REMOVE_SPRITE);
                }
            }
        }
        for (index, step) in self.steps.iter().enumerate() {
            match *step {
                Step::EndSequence => out.push(STEP_END_SEQUENCE),
                Step::SetImage(image) => {
                    out.push(STEP_SET_IMAGE);
                    out.push(image);
                }
                Step::Move { dx, dy } => {
                    out.push(STEP_MOVE);
                    out.push(dx as u8);
                    out.push(dy as u8);
                }
                Step::Wait(frames) => {
                    out.push(STEP_WAIT);
                    out.push(frames);
                }
                Step::JumpIfCounter { target } => {
                    out.push(STEP_JUMP_IF_COUNTER);
                    let relative =
                        data_label_offset(target) as i32 - step_offsets[index] as i32;
                    write_u16_le(&mut out, relative as i16 as u16);
                }
                Step::SetPosition { x, y } => {
                    out.push(STEP_SET_POSITION);
                    write_u16_le(&mut out, x);
                    write_u16_le(&mut out, y);
                }
                Step::SetCounter(value) => {
                    out.push(STEP_SET_COUNTER);
                    out.push(value);
                }
            }
        }
        while out.len() % 16 != 0 {
            out.push(0);
        }
        out
    }
}

/// Step sub-pass. Tracks whether the cursor is inside a labelled
/// sequence; once outside one with only the padding window left, the
/// tail is discarded as alignment garbage.
fn parse_steps(
    cursor: &mut Cursor<&[u8]>,
    data_targets: &mut BTreeSet<usize>,
) -> Result<(Vec<Step>, BTreeMap<usize, usize>)> {
    let mut steps = Vec::new();
    let mut step_offsets = BTreeMap::new();
    let mut inside_sequence = false;

    while remaining(cursor) > 0 {
        let offset = cursor.position() as usize;
        if data_targets.contains(&offset) {
            inside_sequence = true;
        }
        if !inside_sequence && remaining(cursor) <= PADDING_WINDOW {
            break;
        }
        let kind = read_u8(cursor)?;
        let step = match kind {
            STEP_END_SEQUENCE => {
                inside_sequence = false;
                Step::EndSequence
            }
            STEP_SET_IMAGE => Step::SetImage(read_u8(cursor)?),
            STEP_MOVE => Step::Move {
                dx: read_u8(cursor)? as i8,
                dy: read_u8(cursor)? as i8,
            },
            STEP_WAIT => Step::Wait(read_u8(cursor)?),
            STEP_JUMP_IF_COUNTER => {
                let relative = read_u16_le(cursor)? as i16;
                let target = (offset as i64 + i64::from(relative)).max(0) as usize;
                data_targets.insert(target);
                Step::JumpIfCounter { target }
            }
            STEP_SET_POSITION => Step::SetPosition {
                x: read_u16_le(cursor)?,
                y: read_u16_le(cursor)?,
            },
            STEP_SET_COUNTER => Step::SetCounter(read_u8(cursor)?),
            _ => return Err(AssetError::UnknownStep { step: kind, offset }),
        };
        step_offsets.insert(offset, steps.len());
        steps.push(step);
    }
    Ok((steps, step_offsets))
}
