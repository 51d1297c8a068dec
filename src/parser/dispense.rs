//! Dispense: a BTC payment reaching a dispenser address swaps into the
//! escrowed asset.
//!
//! Each live dispenser at the destination vends
//! `floor(btc_amount / rate)` units (oracle dispensers derive the rate
//! from the feed price), capped by what remains in escrow. A dispenser
//! that can no longer cover a full unit closes, returning any dust.

use crate::errors::AppResult;
use crate::ledger::broadcasts::get_oracle_last_price;
use crate::ledger::dispensers::{
    get_dispensers, insert_dispense, update_dispenser, DispenserFilter, DispenserUpdate,
};
use crate::ledger::events::credit;
use crate::parser::ParserContext;
use crate::types::{DispenserStatus, TransactionContext};
use crate::utils::math::satoshirate_to_fiat;
use rusqlite::Connection;
use tracing::info;

/// Ledger transition for one dispense-triggering transaction.
pub fn parse(db: &Connection, ctx: &mut ParserContext, tx: &TransactionContext) -> AppResult<()> {
    let Some(destination) = tx.destination.as_deref() else {
        return Ok(());
    };

    let dispensers = get_dispensers(db, &DispenserFilter::at(destination).live())?;
    let mut dispense_index = 0u32;

    for dispenser in &dispensers {
        if dispenser.give_quantity <= 0 || dispenser.satoshirate <= 0 {
            continue;
        }

        let must_give = if dispenser.oracle_address.is_some()
            && ctx
                .protocol
                .enabled("oracle_dispensers", Some(tx.block_index))
        {
            let oracle_address = dispenser.oracle_address.as_deref().unwrap_or_default();
            let Some(price) = get_oracle_last_price(db, oracle_address, tx.block_index)? else {
                continue;
            };
            let fiatrate = satoshirate_to_fiat(dispenser.satoshirate);
            if fiatrate == 0.0 || price.last_price == 0.0 {
                continue;
            }
            (tx.btc_amount as f64 / (fiatrate / price.last_price)).floor() as i64
        } else {
            (tx.btc_amount / dispenser.satoshirate as u64) as i64
        };

        let remaining_units = dispenser.give_remaining / dispenser.give_quantity;
        let actually_given = must_give.min(remaining_units) * dispenser.give_quantity;
        if actually_given <= 0 {
            continue;
        }
        let give_remaining = dispenser.give_remaining - actually_given;

        credit(
            db,
            tx.block_index,
            &tx.source,
            &dispenser.asset,
            actually_given,
            tx.tx_index,
            "dispense",
            &tx.tx_hash,
        )?;

        let mut update = DispenserUpdate {
            give_remaining: Some(give_remaining),
            dispense_count: Some(dispenser.dispense_count + 1),
            ..DispenserUpdate::default()
        };
        if give_remaining < dispenser.give_quantity {
            // Exhausted: close and return the dust to the vending address.
            update.give_remaining = Some(0);
            if give_remaining > 0 {
                credit(
                    db,
                    tx.block_index,
                    &dispenser.source,
                    &dispenser.asset,
                    give_remaining,
                    tx.tx_index,
                    "dispenser close",
                    &tx.tx_hash,
                )?;
            }
            update.status = Some(DispenserStatus::Closed);
        }
        update_dispenser(db, tx.block_index, &dispenser.tx_hash, &update)?;

        insert_dispense(
            db,
            tx.tx_index,
            dispense_index,
            &tx.tx_hash,
            tx.block_index,
            destination,
            &tx.source,
            &dispenser.asset,
            actually_given,
            &dispenser.tx_hash,
            tx.btc_amount,
        )?;
        dispense_index += 1;

        info!(
            "Dispense of {} {} from {} to {} ({}) [valid]",
            actually_given, dispenser.asset, destination, tx.source, tx.tx_hash
        );
    }

    Ok(())
}
