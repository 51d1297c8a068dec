//! Dispenser engine: open/refill/close automaton, oracle pricing, and the
//! dispensable-address cache.
//!
//! A dispenser is an on-chain vending machine: the holder address gives
//! out units of an asset for BTC payments it receives.

use crate::codec::{self, address as address_codec, dispenser as dispenser_codec};
use crate::config::{BTC, MAX_INT};
use crate::errors::{AppResult, ComposeError, LedgerError};
use crate::ledger::assets::{generate_asset_id, resolve_subasset_longname};
use crate::ledger::balances::{get_address_assets, get_balance, get_balances_count};
use crate::ledger::broadcasts::get_oracle_last_price;
use crate::ledger::dispensers::{
    get_all_dispensables, get_dispensers, get_dispensers_count, get_pending_dispensers,
    get_refilling_count, insert_dispenser, insert_refill, update_dispenser, DispenserFilter,
    DispenserUpdate,
};
use crate::ledger::events::{credit, debit};
use crate::parser::ParserContext;
use crate::types::{Dispenser, DispenserStatus, TransactionContext};
use crate::utils::math::satoshirate_to_fiat;
use rusqlite::Connection;
use std::collections::HashSet;
use tracing::{debug, info};

const MESSAGE_TYPE_ID: u32 = 12;

/// Addresses that host, or ever hosted, a dispenser: a fast negative test
/// that lets per-payment scans skip almost every address.
#[derive(Debug, Clone, Default)]
pub struct DispensableCache {
    dispensable: HashSet<String>,
}

impl DispensableCache {
    /// Rebuild from the persistent dispensers table.
    pub fn init(db: &Connection) -> AppResult<Self> {
        debug!("Initialising Dispensable Cache...");
        Ok(Self {
            dispensable: get_all_dispensables(db)?,
        })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn could_be_dispensable(&self, address: &str) -> bool {
        self.dispensable.contains(address)
    }

    pub fn new_dispensable(&mut self, address: &str) {
        self.dispensable.insert(address.to_string());
    }
}

/// Validate a dispenser message. Returns the asset ID when valid, or the
/// accumulated problem list.
#[allow(clippy::too_many_arguments)]
pub fn validate(
    db: &Connection,
    ctx: &ParserContext,
    source: &str,
    asset: &str,
    give_quantity: u64,
    escrow_quantity: u64,
    mainchainrate: u64,
    status: i64,
    open_address: Option<&str>,
    block_index: u32,
    oracle_address: Option<&str>,
) -> AppResult<(Option<u64>, Vec<String>)> {
    let mut problems = Vec::new();
    let mut asset_id = None;

    if asset == BTC {
        return Ok((None, vec![format!("cannot dispense {BTC}")]));
    }

    let asset = resolve_subasset_longname(db, asset)?;

    let is_opening = status == DispenserStatus::Open.id()
        || status == DispenserStatus::OpenEmptyAddress.id();
    if is_opening {
        if give_quantity == 0 {
            problems.push("give_quantity must be positive".to_string());
        }
        if mainchainrate == 0 {
            problems.push("mainchainrate must be positive".to_string());
        }
        if escrow_quantity < give_quantity {
            problems.push("escrow_quantity must be greater or equal than give_quantity".to_string());
        }
    } else if status != DispenserStatus::Closed.id() {
        problems.push(format!("invalid status {status}"));
    }

    let mut status = status;
    let mut open_address = open_address;
    let query_address = if status == DispenserStatus::OpenEmptyAddress.id() {
        open_address.unwrap_or(source)
    } else {
        source
    };

    let available = get_balance(db, source, &asset)?;
    let must_be_created_by_source = ctx
        .protocol
        .enabled("dispenser_must_be_created_by_source", None);

    if available.is_none() {
        problems.push(format!("address doesn't have the asset {asset}"));
    } else if available.is_some_and(|quantity| (quantity as i128) < i128::from(escrow_quantity)) {
        let quantity = available.unwrap_or(0);
        problems.push(format!(
            "address doesn't have enough balance of {asset} ({quantity} < {escrow_quantity})"
        ));
    } else if must_be_created_by_source
        && open_address.is_some_and(|open| open != source)
        && status != DispenserStatus::Closed.id()
        && get_dispensers(
            db,
            &DispenserFilter::at(query_address).asset(&asset).live(),
        )?
        .is_empty()
    {
        problems.push("dispenser must be created by source".to_string());
    } else {
        if status == DispenserStatus::OpenEmptyAddress.id() && open_address.is_none() {
            open_address = Some(source);
            status = DispenserStatus::Open.id();
        }

        // OpenEmptyAddress with open_address == source degrades to Open.
        if must_be_created_by_source
            && status == DispenserStatus::OpenEmptyAddress.id()
            && open_address == Some(source)
        {
            status = DispenserStatus::Open.id();
        }

        let origin_extended = ctx
            .protocol
            .enabled("dispenser_origin_permission_extended", Some(block_index));

        let open_dispensers = if origin_extended
            && status == DispenserStatus::Closed.id()
            && open_address.is_some_and(|open| open != source)
        {
            get_dispensers(
                db,
                &DispenserFilter::at(open_address.unwrap_or(source))
                    .asset(&asset)
                    .live()
                    .origin(source),
            )?
        } else {
            let query_address = if status == DispenserStatus::OpenEmptyAddress.id() {
                open_address.unwrap_or(source)
            } else {
                source
            };
            get_dispensers(db, &DispenserFilter::at(query_address).asset(&asset).live())?
        };

        let closing_first = open_dispensers
            .first()
            .is_some_and(|d| d.status == DispenserStatus::Closing.id());
        if !closing_first {
            if is_opening {
                if let Some(existing) = open_dispensers.first() {
                    let max_refills = ctx.protocol.value("max_refills", block_index);
                    let refilling_count = if max_refills > 0 {
                        get_refilling_count(db, &existing.tx_hash)?
                    } else {
                        0
                    };

                    if existing.satoshirate as u64 == mainchainrate
                        && existing.give_quantity as u64 == give_quantity
                    {
                        // It's a valid refill.
                        if max_refills > 0 && refilling_count >= max_refills {
                            problems.push("the dispenser reached its maximum refilling".to_string());
                        }
                    } else {
                        if existing.satoshirate as u64 != mainchainrate {
                            problems.push(format!(
                                "address has a dispenser already opened for asset {asset} \
                                 with a different mainchainrate"
                            ));
                        }
                        if existing.give_quantity as u64 != give_quantity {
                            problems.push(format!(
                                "address has a dispenser already opened for asset {asset} \
                                 with a different give_quantity"
                            ));
                        }
                    }
                }
            } else if status == DispenserStatus::Closed.id() && open_dispensers.is_empty() {
                problems.push(format!(
                    "address doesn't have an open dispenser for asset {asset}"
                ));
            }

            if status == DispenserStatus::OpenEmptyAddress.id() {
                // A creator refilling its dispenser at a foreign address is
                // exempt from the empty-address rule.
                let creator_refill = origin_extended
                    && open_dispensers
                        .first()
                        .is_some_and(|existing| existing.origin == source);

                if !creator_refill {
                    let same_origin_count = get_dispensers_count(
                        db,
                        query_address,
                        DispenserStatus::Closed,
                        source,
                    )?;

                    if !(origin_extended && same_origin_count > 0) {
                        // The empty-address rule proper: the count of
                        // balance rows decides, zero-quantity rows included.
                        let existing_balances = get_balances_count(db, query_address)?;
                        if existing_balances > 0 {
                            problems.push(
                                "cannot open on another address if it has any balance history"
                                    .to_string(),
                            );
                        }

                        if origin_extended {
                            let oldest = ctx
                                .oldest_tx
                                .get(query_address, ctx.state.current_block_index());
                            if let Some(oldest_block_index) = oldest {
                                if oldest_block_index > 0 && block_index > oldest_block_index {
                                    problems.push(
                                        "cannot open on another address if it has any confirmed \
                                         bitcoin txs"
                                            .to_string(),
                                    );
                                }
                            }
                        }
                    }
                }
            }

            if problems.is_empty() {
                match generate_asset_id(&asset) {
                    Ok(id) if id != 0 => asset_id = Some(id),
                    _ => problems.push(format!("cannot dispense {asset}")),
                }
            }
        } else {
            problems.push(
                "address has already a dispenser about to close, no action can be taken \
                 until it closes"
                    .to_string(),
            );
        }
    }

    if let Some(oracle_address) = oracle_address {
        if ctx.protocol.enabled("oracle_dispensers", Some(block_index)) {
            let last_price = get_oracle_last_price(db, oracle_address, block_index)?;
            if last_price.is_none() {
                problems.push(format!(
                    "The oracle address {oracle_address} has not broadcasted any price yet"
                ));
            }
        }
    }

    if give_quantity > MAX_INT as u64
        || escrow_quantity > MAX_INT as u64
        || mainchainrate > MAX_INT as u64
    {
        problems.push("integer overflow".to_string());
    }

    if problems.is_empty() {
        Ok((asset_id, problems))
    } else {
        Ok((None, problems))
    }
}

/// BTC fee owed to the oracle for an open or refill, in satoshis.
/// `None` when the oracle has no price yet.
pub fn calculate_oracle_fee(
    db: &Connection,
    escrow_quantity: u64,
    give_quantity: u64,
    mainchainrate: u64,
    oracle_address: &str,
    block_index: u32,
) -> AppResult<Option<i64>> {
    let Some(price) = get_oracle_last_price(db, oracle_address, block_index)? else {
        return Ok(None);
    };

    let last_fee_multiplier = price.last_fee as f64 / crate::config::UNIT as f64;

    // Format mainchainrate to ######.##
    let oracle_mainchainrate = satoshirate_to_fiat(mainchainrate as i64);
    let oracle_mainchainrate_btc = oracle_mainchainrate / price.last_price;

    let remaining = if give_quantity == 0 {
        0
    } else {
        escrow_quantity / give_quantity
    };
    let total_quantity_btc = oracle_mainchainrate_btc * remaining as f64;
    let oracle_fee_btc = (total_quantity_btc * last_fee_multiplier * crate::config::UNIT as f64) as i64;

    Ok(Some(oracle_fee_btc))
}

/// Author a dispenser transaction.
#[allow(clippy::too_many_arguments)]
pub fn compose(
    db: &Connection,
    ctx: &ParserContext,
    source: &str,
    asset: &str,
    give_quantity: u64,
    escrow_quantity: u64,
    mainchainrate: u64,
    status: i64,
    open_address: Option<&str>,
    oracle_address: Option<&str>,
    skip_validation: bool,
) -> AppResult<(String, Vec<(String, u64)>, Vec<u8>)> {
    if let Some(oracle_address) = oracle_address {
        if address_codec::pack_legacy(oracle_address).is_err() {
            return Err(ComposeError::single("Oracle address not supported by dispenser").into());
        }
    }

    let height = ctx.state.current_block_index();
    let (asset_id, problems) = validate(
        db,
        ctx,
        source,
        asset,
        give_quantity,
        escrow_quantity,
        mainchainrate,
        status,
        open_address,
        height,
        oracle_address,
    )?;
    if !problems.is_empty() && !skip_validation {
        return Err(ComposeError::new(problems).into());
    }
    let asset_id = match asset_id {
        Some(id) => id,
        None => generate_asset_id(asset)?,
    };

    let mut destinations = Vec::new();
    let mut data = codec::pack_message_type(&ctx.protocol, MESSAGE_TYPE_ID, height);
    data.extend(
        dispenser_codec::pack(asset_id, give_quantity, escrow_quantity, mainchainrate, status)
            .map_err(|e| ComposeError::single(&e.to_string()))?,
    );

    let is_empty_address = status == DispenserStatus::OpenEmptyAddress.id() && open_address.is_some();
    let foreign_close = ctx
        .protocol
        .enabled("dispenser_origin_permission_extended", None)
        && status == DispenserStatus::Closed.id()
        && open_address.is_some_and(|open| open != source);
    if is_empty_address || foreign_close {
        let open_address = open_address.unwrap_or(source);
        data.extend(
            address_codec::pack_legacy(open_address)
                .map_err(|e| ComposeError::single(&e.to_string()))?,
        );
    }

    if let Some(oracle_address) = oracle_address {
        if ctx.protocol.enabled("oracle_dispensers", None) {
            let oracle_fee =
                calculate_oracle_fee(db, escrow_quantity, give_quantity, mainchainrate, oracle_address, height)?;
            if let Some(oracle_fee) = oracle_fee {
                if oracle_fee >= ctx.regular_dust_size as i64 {
                    destinations.push((oracle_address.to_string(), oracle_fee as u64));
                }
            }
            data.extend(
                address_codec::pack_legacy(oracle_address)
                    .map_err(|e| ComposeError::single(&e.to_string()))?,
            );
        }
    }

    Ok((source.to_string(), destinations, data))
}

/// Ledger transition for one dispenser transaction.
pub fn parse(
    db: &Connection,
    ctx: &mut ParserContext,
    tx: &TransactionContext,
    message: &[u8],
) -> AppResult<()> {
    let data = match dispenser_codec::unpack(&ctx.protocol, message, tx.block_index) {
        Ok(data) => data,
        Err(_) => {
            debug!(
                "Invalid dispenser transaction [{}] (invalid: could not unpack)",
                tx.tx_hash
            );
            return Ok(());
        }
    };

    let action_address = data
        .action_address
        .clone()
        .unwrap_or_else(|| tx.source.clone());
    let mut status = "valid".to_string();

    if ctx.protocol.enabled("dispenser_parsing_validation", None) {
        let reads_action_address = data.dispenser_status
            == DispenserStatus::OpenEmptyAddress.id()
            || data.dispenser_status == DispenserStatus::Closed.id();
        let (_asset_id, problems) = validate(
            db,
            ctx,
            &tx.source,
            &data.asset,
            data.give_quantity,
            data.escrow_quantity,
            data.mainchainrate,
            data.dispenser_status,
            reads_action_address.then_some(action_address.as_str()),
            tx.block_index,
            data.oracle_address.as_deref(),
        )?;
        if !problems.is_empty() {
            status = format!("invalid: {}", problems.join("; "));
        }
    }

    if status == "valid" {
        let is_opening = data.dispenser_status == DispenserStatus::Open.id()
            || data.dispenser_status == DispenserStatus::OpenEmptyAddress.id();

        if is_opening {
            parse_open_or_refill(db, ctx, tx, &data, &action_address, &mut status)?;
        } else if data.dispenser_status == DispenserStatus::Closed.id() {
            parse_close(db, ctx, tx, &data, &action_address, &mut status)?;
        } else {
            status = "invalid: status must be one of OPEN or CLOSE".to_string();
        }
    }

    if status != "valid" {
        debug!("Invalid dispenser transaction [{}] ({})", tx.tx_hash, status);
    }

    Ok(())
}

fn parse_open_or_refill(
    db: &Connection,
    ctx: &mut ParserContext,
    tx: &TransactionContext,
    data: &dispenser_codec::DispenserData,
    action_address: &str,
    status: &mut String,
) -> AppResult<()> {
    let existing = get_dispensers(
        db,
        &DispenserFilter::at(action_address)
            .asset(&data.asset)
            .status(DispenserStatus::Open),
    )?;

    if existing.is_empty() {
        check_oracle_fee(db, ctx, tx, data, status)?;

        let escrow = data.escrow_quantity as i64;
        if status == "valid" {
            // Create the new dispenser.
            if data.dispenser_status == DispenserStatus::OpenEmptyAddress.id() {
                let mut is_empty_address = true;
                for asset_name in get_address_assets(db, action_address)? {
                    if get_balance(db, action_address, &asset_name)?.unwrap_or(0) > 0 {
                        is_empty_address = false;
                        break;
                    }
                }

                if is_empty_address {
                    // Escrow moves to the foreign address's ledger position
                    // and is held there.
                    let moved = debit(
                        db,
                        tx.block_index,
                        &tx.source,
                        &data.asset,
                        escrow,
                        tx.tx_index,
                        "open dispenser empty addr",
                        &tx.tx_hash,
                    )
                    .and_then(|_| {
                        credit(
                            db,
                            tx.block_index,
                            action_address,
                            &data.asset,
                            escrow,
                            tx.tx_index,
                            "open dispenser empty addr",
                            &tx.tx_hash,
                        )
                    })
                    .and_then(|_| {
                        debit(
                            db,
                            tx.block_index,
                            action_address,
                            &data.asset,
                            escrow,
                            tx.tx_index,
                            "open dispenser empty addr",
                            &tx.tx_hash,
                        )
                    });
                    if let Err(e) = moved {
                        *status = match e {
                            LedgerError::InsufficientFunds => {
                                "invalid: insufficient funds".to_string()
                            }
                            e => return Err(e.into()),
                        };
                    }
                } else {
                    *status = "invalid: address not empty".to_string();
                }
            } else if let Err(e) = debit(
                db,
                tx.block_index,
                &tx.source,
                &data.asset,
                escrow,
                tx.tx_index,
                "open dispenser",
                &tx.tx_hash,
            ) {
                *status = match e {
                    LedgerError::InsufficientFunds => "invalid: insufficient funds".to_string(),
                    e => return Err(e.into()),
                };
            }
        }

        if status == "valid" {
            let dispenser = Dispenser {
                tx_index: tx.tx_index,
                tx_hash: tx.tx_hash.clone(),
                block_index: tx.block_index,
                source: action_address.to_string(),
                asset: data.asset.clone(),
                give_quantity: data.give_quantity as i64,
                escrow_quantity: escrow,
                satoshirate: data.mainchainrate as i64,
                status: DispenserStatus::Open.id(),
                give_remaining: escrow,
                oracle_address: data.oracle_address.clone(),
                origin: tx.source.clone(),
                dispense_count: 0,
                close_block_index: None,
                last_status_tx_hash: None,
                last_status_tx_source: None,
            };
            insert_dispenser(db, &dispenser)?;

            // Add the address to the dispensable cache.
            if !ctx.state.parsing_mempool() {
                ctx.cache.new_dispensable(action_address);
            }

            info!(
                "Dispenser opened for {} at {} ({}) [valid]",
                data.asset, action_address, tx.tx_hash
            );
        }
    } else if existing.len() == 1
        && existing[0].satoshirate as u64 == data.mainchainrate
        && existing[0].give_quantity as u64 == data.give_quantity
    {
        let refill_allowed = tx.source == action_address
            || (ctx
                .protocol
                .enabled("dispenser_origin_permission_extended", Some(tx.block_index))
                && tx.source == existing[0].origin);
        if refill_allowed {
            check_oracle_fee(db, ctx, tx, data, status)?;

            if status == "valid" {
                // Refill the dispenser by the given amount.
                let escrow = data.escrow_quantity as i64;
                match debit(
                    db,
                    tx.block_index,
                    &tx.source,
                    &data.asset,
                    escrow,
                    tx.tx_index,
                    "refill dispenser",
                    &tx.tx_hash,
                ) {
                    Ok(()) => {
                        update_dispenser(
                            db,
                            tx.block_index,
                            &existing[0].tx_hash,
                            &DispenserUpdate {
                                give_remaining: Some(existing[0].give_remaining + escrow),
                                // dispense count starts over on refill
                                dispense_count: Some(0),
                                ..DispenserUpdate::default()
                            },
                        )?;
                        insert_refill(
                            db,
                            tx.tx_index,
                            &tx.tx_hash,
                            tx.block_index,
                            &tx.source,
                            action_address,
                            &data.asset,
                            escrow,
                            &existing[0].tx_hash,
                        )?;
                        info!(
                            "Refilled dispenser for {} at {} ({}) [valid]",
                            data.asset, tx.source, tx.tx_hash
                        );
                    }
                    Err(LedgerError::InsufficientFunds) => {
                        *status = "insufficient funds".to_string();
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        } else {
            *status = "invalid: can only refill dispenser from source or origin".to_string();
        }
    } else {
        *status = "can only have one open dispenser per asset per address".to_string();
    }

    Ok(())
}

fn parse_close(
    db: &Connection,
    ctx: &ParserContext,
    tx: &TransactionContext,
    data: &dispenser_codec::DispenserData,
    action_address: &str,
    status: &mut String,
) -> AppResult<()> {
    let close_delay = ctx.protocol.value("dispenser_close_delay", tx.block_index);
    let close_from_another_address = ctx
        .protocol
        .enabled("dispenser_origin_permission_extended", Some(tx.block_index))
        && action_address != tx.source;

    let existing = if close_from_another_address {
        get_dispensers(
            db,
            &DispenserFilter::at(action_address)
                .asset(&data.asset)
                .status(DispenserStatus::Open)
                .origin(&tx.source),
        )?
    } else {
        get_dispensers(
            db,
            &DispenserFilter::at(&tx.source)
                .asset(&data.asset)
                .status(DispenserStatus::Open),
        )?
    };

    if existing.len() == 1 {
        let update = if close_delay == 0 {
            credit(
                db,
                tx.block_index,
                &tx.source,
                &data.asset,
                existing[0].give_remaining,
                tx.tx_index,
                "close dispenser",
                &tx.tx_hash,
            )?;
            DispenserUpdate {
                give_remaining: Some(0),
                status: Some(DispenserStatus::Closed),
                ..DispenserUpdate::default()
            }
        } else {
            DispenserUpdate {
                status: Some(DispenserStatus::Closing),
                last_status_tx_hash: Some(tx.tx_hash.clone()),
                last_status_tx_source: Some(tx.source.clone()),
                close_block_index: Some(tx.block_index + close_delay as u32),
                ..DispenserUpdate::default()
            }
        };
        update_dispenser(db, tx.block_index, &existing[0].tx_hash, &update)?;

        if close_delay == 0 {
            info!(
                "Dispenser closed for {} at {} ({}) [valid]",
                data.asset, tx.source, tx.tx_hash
            );
        } else {
            info!(
                "Closing dispenser for {} at {} in {} blocks ({}) [valid]",
                data.asset, tx.source, close_delay, tx.tx_hash
            );
        }
    } else {
        *status = "dispenser inexistent".to_string();
    }

    Ok(())
}

/// Oracle fee enforcement shared by open and refill.
fn check_oracle_fee(
    db: &Connection,
    ctx: &ParserContext,
    tx: &TransactionContext,
    data: &dispenser_codec::DispenserData,
    status: &mut String,
) -> AppResult<()> {
    let Some(oracle_address) = data.oracle_address.as_deref() else {
        return Ok(());
    };
    if !ctx
        .protocol
        .enabled("oracle_dispensers", Some(tx.block_index))
    {
        return Ok(());
    }

    match calculate_oracle_fee(
        db,
        data.escrow_quantity,
        data.give_quantity,
        data.mainchainrate,
        oracle_address,
        tx.block_index,
    )? {
        Some(oracle_fee) if oracle_fee >= ctx.regular_dust_size as i64 => {
            let paid_to_oracle = tx.destination.as_deref() == Some(oracle_address)
                && tx.btc_amount >= oracle_fee as u64;
            if !paid_to_oracle {
                *status = "invalid: insufficient or non-existent oracle fee".to_string();
            }
        }
        Some(_) => {}
        None => {
            *status = "invalid: insufficient or non-existent oracle fee".to_string();
        }
    }
    Ok(())
}

/// At each block boundary, finish Closing dispensers whose delay elapsed.
pub fn close_pending(db: &Connection, ctx: &ParserContext, block_index: u32) -> AppResult<()> {
    let block_delay = ctx.protocol.value("dispenser_close_delay", block_index);
    if block_delay == 0 {
        return Ok(());
    }

    for dispenser in get_pending_dispensers(db, block_index)? {
        let recipient = dispenser
            .last_status_tx_source
            .clone()
            .unwrap_or_else(|| dispenser.source.clone());
        let event = dispenser
            .last_status_tx_hash
            .clone()
            .unwrap_or_else(|| dispenser.tx_hash.clone());

        // tx_index 0 marks block-level actions
        credit(
            db,
            block_index,
            &recipient,
            &dispenser.asset,
            dispenser.give_remaining,
            0,
            "close dispenser",
            &event,
        )?;
        update_dispenser(
            db,
            block_index,
            &dispenser.tx_hash,
            &DispenserUpdate {
                give_remaining: Some(0),
                status: Some(DispenserStatus::Closed),
                ..DispenserUpdate::default()
            },
        )?;

        info!(
            "Closed dispenser for {} at {}",
            dispenser.asset, dispenser.source
        );
    }

    Ok(())
}

/// Whether a BTC payment of `amount` to `destination` triggers a dispense.
pub fn is_dispensable(
    db: &Connection,
    ctx: &ParserContext,
    destination: Option<&str>,
    amount: u64,
) -> AppResult<bool> {
    let Some(destination) = destination else {
        return Ok(false);
    };

    // The cache is only a shortcut for confirmed parsing; mempool previews
    // go straight to the store.
    if !ctx.state.parsing_mempool() && !ctx.cache.could_be_dispensable(destination) {
        return Ok(false);
    }

    let dispensers = get_dispensers(db, &DispenserFilter::at(destination).live())?;
    for next_dispenser in &dispensers {
        if let Some(oracle_address) = &next_dispenser.oracle_address {
            let last_price =
                get_oracle_last_price(db, oracle_address, ctx.state.current_block_index())?;
            let fiatrate = satoshirate_to_fiat(next_dispenser.satoshirate);
            let Some(price) = last_price else {
                return Ok(false);
            };
            if fiatrate == 0.0 || price.last_price == 0.0 {
                return Ok(false);
            }
            if amount as f64 >= fiatrate / price.last_price {
                return Ok(true);
            }
        } else if (amount as i64) >= next_dispenser.satoshirate {
            return Ok(true);
        }
    }

    Ok(false)
}
