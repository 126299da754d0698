use clawnet_core::constants::TREASURY_DID;
use clawnet_core::error::ClawError;
use clawnet_core::types::{Address, Balance, Did};
use serde_json::Value;

use crate::db::DerivedDb;
use crate::derived::Account;
use crate::reducers::helpers::{str_field, u128_field};

fn load_or_open(db: &DerivedDb, address: &Address) -> Result<Account, ClawError> {
    Ok(db.get_account(address)?.unwrap_or_else(|| Account {
        address: address.clone(),
        balance: 0,
    }))
}

fn credit(db: &DerivedDb, address: &Address, amount: Balance) -> Result<(), ClawError> {
    let mut acc = load_or_open(db, address)?;
    acc.balance = acc
        .balance
        .checked_add(amount)
        .ok_or_else(|| ClawError::MalformedValue("balance overflow".to_string()))?;
    db.put_account(&acc)
}

fn debit(db: &DerivedDb, address: &Address, amount: Balance) -> Result<(), ClawError> {
    let mut acc = load_or_open(db, address)?;
    if acc.balance < amount {
        return Err(ClawError::InsufficientBalance {
            need: amount,
            have: acc.balance,
        });
    }
    acc.balance -= amount;
    db.put_account(&acc)
}

/// `wallet.transfer` (spec.md §4.4): debit `from`, credit `to`, debit `fee`
/// to the treasury.
pub fn transfer(payload: &Value, db: &DerivedDb) -> Result<(), ClawError> {
    let from = Address(str_field(payload, "from")?.to_string());
    let to = Address(str_field(payload, "to")?.to_string());
    let amount = u128_field(payload, "amount")?;
    let fee = payload.get("fee").map(|_| u128_field(payload, "fee")).transpose()?.unwrap_or(0);

    if amount == 0 {
        return Err(ClawError::ZeroAmount);
    }
    if from == to {
        return Err(ClawError::SelfTransfer);
    }

    let total = amount
        .checked_add(fee)
        .ok_or_else(|| ClawError::MalformedValue("amount+fee overflow".to_string()))?;
    debit(db, &from, total)?;
    credit(db, &to, amount)?;
    if fee > 0 {
        credit(db, &Address(TREASURY_DID.to_string()), fee)?;
    }
    Ok(())
}

fn require_treasury(issuer: &Did) -> Result<(), ClawError> {
    if issuer.as_str() != TREASURY_DID {
        return Err(ClawError::Unauthorized {
            issuer: issuer.to_string(),
            action: "wallet.mint/burn/reward/fee".to_string(),
        });
    }
    Ok(())
}

/// `wallet.mint` (spec.md §4.4): system event, issuer must be the treasury.
pub fn mint(issuer: &Did, payload: &Value, db: &DerivedDb) -> Result<(), ClawError> {
    require_treasury(issuer)?;
    let to = Address(str_field(payload, "to")?.to_string());
    let amount = u128_field(payload, "amount")?;
    credit(db, &to, amount)
}

/// `wallet.burn` (spec.md §4.4): system event, issuer must be the treasury.
pub fn burn(issuer: &Did, payload: &Value, db: &DerivedDb) -> Result<(), ClawError> {
    require_treasury(issuer)?;
    let from = Address(str_field(payload, "from")?.to_string());
    let amount = u128_field(payload, "amount")?;
    debit(db, &from, amount)
}

/// `wallet.reward` (spec.md §4.4): treasury-funded payout.
pub fn reward(issuer: &Did, payload: &Value, db: &DerivedDb) -> Result<(), ClawError> {
    require_treasury(issuer)?;
    let to = Address(str_field(payload, "to")?.to_string());
    let amount = u128_field(payload, "amount")?;
    debit(db, &Address(TREASURY_DID.to_string()), amount)?;
    credit(db, &to, amount)
}

/// `wallet.fee` (spec.md §4.4): direct fee assessment into the treasury.
pub fn fee(issuer: &Did, payload: &Value, db: &DerivedDb) -> Result<(), ClawError> {
    require_treasury(issuer)?;
    let from = Address(str_field(payload, "from")?.to_string());
    let amount = u128_field(payload, "amount")?;
    debit(db, &from, amount)?;
    credit(db, &Address(TREASURY_DID.to_string()), amount)
}
