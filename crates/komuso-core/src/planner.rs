//! input selection and transaction planning
//!
//! every transaction spends exactly two inputs (real notes padded with
//! dummies) and creates exactly two outputs (change + zero filler). amounts
//! that need more than two inputs are split into slices, and large deposits
//! are split into standard denominations.

use ark_bn254::Fr;
use komuso_pool::{AssetTag, Note, NoteKeypair};
use rand::{CryptoRng, RngCore};

use crate::error::{EngineError, Result};

/// one planned two-input / two-output transaction
#[derive(Clone, Debug)]
pub struct TxPlan {
    pub inputs: [Note; 2],
    pub outputs: [Note; 2],
    /// positive = deposit, negative = withdrawal
    pub ext_amount: i64,
    pub fee: u64,
}

/// floor(amount × bps / 10000)
pub fn fee_for(amount: u64, fee_rate_bps: u64) -> u64 {
    ((amount as u128 * fee_rate_bps as u128) / 10_000) as u64
}

/// circuit encoding of the balance delta: (ext_amount − fee) mod FIELD_SIZE
pub fn public_amount(ext_amount: i64, fee: u64) -> Fr {
    let delta = ext_amount as i128 - fee as i128;
    if delta >= 0 {
        Fr::from(delta as u64)
    } else {
        -Fr::from((-delta) as u64)
    }
}

/// the one or two largest spendable notes, by amount
pub fn select_inputs(spendable: &[Note]) -> Vec<Note> {
    let mut notes = spendable.to_vec();
    notes.sort_by(|a, b| b.amount.cmp(&a.amount));
    notes.truncate(2);
    notes
}

/// deterministic seed for one batch dummy keypair
fn batch_dummy_seed(timestamp: u64, tx_index: u32, slot: u8) -> Vec<u8> {
    format!("{}:{}:{}", timestamp, tx_index, slot).into_bytes()
}

/// the two dummy keypairs of one batched transaction
///
/// dummy-input nullifiers depend on the keypair, so every (transaction,
/// slot) pair across a batch must derive a distinct one
pub fn batch_dummy_keypairs(timestamp: u64, tx_index: u32) -> Result<(NoteKeypair, NoteKeypair)> {
    let first = NoteKeypair::from_seed(&batch_dummy_seed(timestamp, tx_index, 0))?;
    let second = NoteKeypair::from_seed(&batch_dummy_seed(timestamp, tx_index, 1))?;
    Ok((first, second))
}

fn ext_amount_for_deposit(amount: u64) -> Result<i64> {
    i64::try_from(amount).map_err(|_| EngineError::InvalidAmount(amount.to_string()))
}

/// deposit with no spendable notes: two dummy inputs, change = amount − fee
pub fn plan_fresh_deposit<R: RngCore + CryptoRng>(
    amount: u64,
    fee: u64,
    holder: &NoteKeypair,
    dummies: (NoteKeypair, NoteKeypair),
    asset: AssetTag,
    next_index: u64,
    rng: &mut R,
) -> Result<TxPlan> {
    if amount == 0 {
        return Err(EngineError::InvalidAmount("deposit of zero".into()));
    }
    if amount <= fee {
        return Err(EngineError::InsufficientBalance { have: amount, need: fee + 1 });
    }
    let ext_amount = ext_amount_for_deposit(amount)?;

    Ok(TxPlan {
        inputs: [
            Note::dummy(dummies.0, asset, rng),
            Note::dummy(dummies.1, asset, rng),
        ],
        outputs: [
            Note::new(amount - fee, holder.clone(), asset, next_index, rng),
            Note::new(0, holder.clone(), asset, next_index + 1, rng),
        ],
        ext_amount,
        fee,
    })
}

/// deposit that folds existing notes in: change = Σ inputs + amount − fee
pub fn plan_consolidating_deposit<R: RngCore + CryptoRng>(
    spendable: &[Note],
    amount: u64,
    fee: u64,
    holder: &NoteKeypair,
    asset: AssetTag,
    next_index: u64,
    rng: &mut R,
) -> Result<TxPlan> {
    if amount == 0 {
        return Err(EngineError::InvalidAmount("deposit of zero".into()));
    }
    let selected = select_inputs(spendable);
    if selected.is_empty() {
        return Err(EngineError::NoSpendableNotes);
    }
    let ext_amount = ext_amount_for_deposit(amount)?;

    let input_sum: u128 = selected.iter().map(|n| n.amount as u128).sum();
    let change = input_sum + amount as u128 - fee as u128;
    let change = u64::try_from(change)
        .map_err(|_| EngineError::InvalidAmount("change exceeds u64".into()))?;

    let inputs = pad_inputs(selected, asset, rng)?;

    Ok(TxPlan {
        inputs,
        outputs: [
            Note::new(change, holder.clone(), asset, next_index, rng),
            Note::new(0, holder.clone(), asset, next_index + 1, rng),
        ],
        ext_amount,
        fee,
    })
}

/// withdrawal: change = Σ inputs − amount − fee goes back to the holder
pub fn plan_withdrawal<R: RngCore + CryptoRng>(
    selected: &[Note],
    amount: u64,
    fee: u64,
    holder: &NoteKeypair,
    asset: AssetTag,
    next_index: u64,
    rng: &mut R,
) -> Result<TxPlan> {
    if amount == 0 {
        return Err(EngineError::InvalidAmount("withdrawal of zero".into()));
    }
    if selected.is_empty() {
        return Err(EngineError::NoSpendableNotes);
    }
    if selected.len() > 2 {
        return Err(EngineError::InvalidState(format!(
            "{} inputs in one transaction",
            selected.len()
        )));
    }
    let ext_amount = -ext_amount_for_deposit(amount)?;

    let input_sum: u64 = selected.iter().map(|n| n.amount).sum();
    let need = amount
        .checked_add(fee)
        .ok_or_else(|| EngineError::InvalidAmount("amount + fee overflows".into()))?;
    if input_sum < need {
        return Err(EngineError::InsufficientBalance { have: input_sum, need });
    }

    let inputs = pad_inputs(selected.to_vec(), asset, rng)?;

    Ok(TxPlan {
        inputs,
        outputs: [
            Note::new(input_sum - amount - fee, holder.clone(), asset, next_index, rng),
            Note::new(0, holder.clone(), asset, next_index + 1, rng),
        ],
        ext_amount,
        fee,
    })
}

/// pad a 1..=2 note selection with random-keypair dummies
fn pad_inputs<R: RngCore + CryptoRng>(
    mut selected: Vec<Note>,
    asset: AssetTag,
    rng: &mut R,
) -> Result<[Note; 2]> {
    while selected.len() < 2 {
        selected.push(Note::dummy(NoteKeypair::random(rng)?, asset, rng));
    }
    let second = selected.pop().expect("padded to two");
    let first = selected.pop().expect("padded to two");
    Ok([first, second])
}

// ---------------------------------------------------------------------------
// batch planning

/// one slice of a withdrawal that needs more than two inputs
#[derive(Clone, Debug)]
pub struct WithdrawSlice {
    pub inputs: Vec<Note>,
    pub amount: u64,
    pub fee: u64,
}

#[derive(Clone, Debug)]
pub struct WithdrawPlan {
    pub slices: Vec<WithdrawSlice>,
    pub requested: u64,
    /// sum of slice amounts; less than `requested` when the balance is short
    pub planned: u64,
}

impl WithdrawPlan {
    pub fn is_partial(&self) -> bool {
        self.planned < self.requested
    }
}

/// greedily pair the largest notes into ≤2-input slices until the request
/// is covered or the notes run out
///
/// per slice: fee = floor(Σ inputs × bps / 10000),
/// amount = min(remaining, Σ inputs − fee)
pub fn plan_withdrawal_slices(
    spendable: &[Note],
    requested: u64,
    fee_rate_bps: u64,
) -> WithdrawPlan {
    let mut notes = spendable.to_vec();
    notes.sort_by(|a, b| b.amount.cmp(&a.amount));

    let mut slices = Vec::new();
    let mut remaining = requested;

    let mut pool = notes.into_iter();
    while remaining > 0 {
        let mut inputs = Vec::with_capacity(2);
        for note in pool.by_ref() {
            inputs.push(note);
            if inputs.len() == 2 {
                break;
            }
        }
        if inputs.is_empty() {
            break;
        }

        let input_sum: u64 = inputs.iter().map(|n| n.amount).sum();
        let fee = fee_for(input_sum, fee_rate_bps);
        if input_sum <= fee {
            // dust that cannot even cover its own fee
            break;
        }

        let amount = remaining.min(input_sum - fee);
        slices.push(WithdrawSlice { inputs, amount, fee });
        remaining -= amount;
    }

    WithdrawPlan {
        slices,
        requested,
        planned: requested - remaining,
    }
}

/// greedily split a deposit into multiples of the standard denominations,
/// expressed against the asset's natural unit
///
/// the remainder below the smallest denomination is dropped from the plan
pub fn plan_deposit_denominations(amount: u64, unit: u64) -> Vec<u64> {
    let denominations = [
        unit.saturating_mul(100),
        unit.saturating_mul(10),
        unit,
        unit / 10,
        unit / 100,
        unit / 1000,
    ];

    let mut slices = Vec::new();
    let mut remaining = amount;
    for denomination in denominations {
        if denomination == 0 {
            continue;
        }
        while remaining >= denomination {
            slices.push(denomination);
            remaining -= denomination;
        }
    }
    slices
}
