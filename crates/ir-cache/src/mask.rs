//! Causal, sequence-isolating attention mask.

use ir_tensor::Shape;

use crate::occupancy::{SeqId, Slot};

/// Shape of the mask for a batch of `batch_size` tokens written at `pos`:
/// one row per new token, one column per valid slot.
pub fn mask_shape(pos: usize, batch_size: usize) -> Shape {
    Shape::new(vec![batch_size, pos + batch_size])
}

/// Builds the additive attention mask for a batch written at slot `pos`.
///
/// `slots` is the occupancy record already extended with `seqs`. Entry
/// `(i, j)` is `0.0` when slot `j` is not in the future of token `i`
/// (`j <= pos + i`) and is owned by the same sequence as token `i`; every
/// other entry is negative infinity. Row-major, `seqs.len()` rows.
pub fn build_mask(pos: usize, seqs: &[SeqId], slots: &[Slot]) -> Vec<f32> {
    // Assumes causal attention without padding or sliding windows.
    let cur_size = pos + seqs.len();
    let mut mask = vec![0.0f32; seqs.len() * cur_size];

    for (i, &seq) in seqs.iter().enumerate() {
        let row = &mut mask[i * cur_size..(i + 1) * cur_size];
        for (j, value) in row.iter_mut().enumerate() {
            let visible = j <= pos + i && slots.get(j).is_some_and(|s| s.is_owned_by(seq));
            if !visible {
                *value = f32::NEG_INFINITY;
            }
        }
    }

    mask
}

#[cfg(test)]
mod tests {
    use super::*;

    const NEG_INF: f32 = f32::NEG_INFINITY;

    fn occupied(seqs: &[SeqId]) -> Vec<Slot> {
        seqs.iter().map(|&s| Slot::Occupied(s)).collect()
    }

    #[test]
    fn test_single_sequence_prefill() {
        let m = build_mask(0, &[1, 1], &occupied(&[1, 1]));
        assert_eq!(m, vec![0.0, NEG_INF, 0.0, 0.0]);
        assert_eq!(mask_shape(0, 2).dims(), &[2, 2]);
    }

    #[test]
    fn test_decode_step_sees_history() {
        let m = build_mask(2, &[1], &occupied(&[1, 1, 1]));
        assert_eq!(m, vec![0.0, 0.0, 0.0]);
        assert_eq!(mask_shape(2, 1).dims(), &[1, 3]);
    }

    #[test]
    fn test_sequences_are_isolated() {
        let m = build_mask(0, &[0, 1], &occupied(&[0, 1]));
        assert_eq!(m, vec![0.0, NEG_INF, NEG_INF, 0.0]);
    }

    #[test]
    fn test_removed_slot_is_masked() {
        let slots = vec![Slot::Removed, Slot::Occupied(1), Slot::Occupied(1)];
        let m = build_mask(2, &[1], &slots);
        assert_eq!(m, vec![NEG_INF, 0.0, 0.0]);
    }

    #[test]
    fn test_empty_batch() {
        assert!(build_mask(3, &[], &occupied(&[1, 1, 1])).is_empty());
    }

    /// Enumerates every occupancy over a small alphabet (two sequences plus
    /// the removed marker) and every split into history and batch.
    #[test]
    fn test_exhaustive_small_capacity() {
        let alphabet = [Slot::Occupied(0), Slot::Occupied(1), Slot::Removed];
        for total in 1..=5usize {
            let combos = alphabet.len().pow(total as u32);
            for code in 0..combos {
                let mut c = code;
                let slots: Vec<Slot> = (0..total)
                    .map(|_| {
                        let s = alphabet[c % alphabet.len()];
                        c /= alphabet.len();
                        s
                    })
                    .collect();
                for pos in 0..total {
                    // The batch itself is always freshly occupied.
                    if slots[pos..].contains(&Slot::Removed) {
                        continue;
                    }
                    let seqs: Vec<SeqId> = slots[pos..]
                        .iter()
                        .map(|s| match s {
                            Slot::Occupied(id) => *id,
                            Slot::Removed => unreachable!(),
                        })
                        .collect();
                    let m = build_mask(pos, &seqs, &slots);
                    assert_eq!(m.len(), seqs.len() * total);
                    for (i, &seq) in seqs.iter().enumerate() {
                        for j in 0..total {
                            let expect_open = j <= pos + i && slots[j] == Slot::Occupied(seq);
                            let v = m[i * total + j];
                            if expect_open {
                                assert_eq!(v, 0.0, "slots={slots:?} pos={pos} ({i},{j})");
                            } else {
                                assert_eq!(v, NEG_INF, "slots={slots:?} pos={pos} ({i},{j})");
                            }
                        }
                    }
                }
            }
        }
    }
}
