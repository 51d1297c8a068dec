//! Broadcast engine: feed validation, composition, and the ledger
//! transition driving bet-match settlement.
//!
//! Bets settle on the broadcast `timestamp` field, not the block index.
//! A feed locks forever when a broadcast's text is exactly "lock".

use crate::codec::{self, broadcast as broadcast_codec, CodecError};
use crate::config::{ADDRESS_OPTION_MAX_VALUE, MAX_INT, UNIT, XCP};
use crate::errors::{AppResult, ComposeError, OptionsError};
use crate::ledger::addresses::upsert_address_options;
use crate::ledger::bets::{
    cancel_bet, cancel_bet_match, get_bets_by_feed, get_pending_bet_matches,
    insert_bet_match_resolution, update_bet_match_status,
};
use crate::ledger::broadcasts::{get_last_broadcast, insert_broadcast};
use crate::ledger::events::credit;
use crate::parser::ParserContext;
use crate::types::bet::{CFD_TYPE_ID, EQUAL_TYPE_ID};
use crate::types::{BetMatch, BetMatchResolution, Broadcast, BroadcastPayload, TransactionContext};
use crate::utils::content::check_content;
use crate::utils::math::{credit_to_i64, rational_from_f64, round_half_even, truncated_fee};
use crate::utils::{active_options, make_id};
use num::bigint::BigInt;
use num::rational::BigRational;
use num::Signed;
use rusqlite::Connection;
use tracing::{debug, info};

const MESSAGE_TYPE_ID: u32 = 30;

/// Parse the options integer out of an `"options N"` text, if present.
pub fn parse_options_from_string(text: &str) -> Result<Option<i128>, OptionsError> {
    let parts: Vec<&str> = text.split(' ').collect();
    if parts.len() == 2 {
        let options = parts[1]
            .parse::<i128>()
            .map_err(|_| OptionsError::NotAnInteger)?;
        return Ok(Some(options));
    }
    Ok(None)
}

/// Ensure the options are all valid and in range.
pub fn validate_address_options(options: i128) -> Result<i64, OptionsError> {
    if options > i128::from(MAX_INT) || options < 0 {
        return Err(OptionsError::IntegerOverflow);
    }
    let options = options as i64;
    if options > ADDRESS_OPTION_MAX_VALUE {
        return Err(OptionsError::OutOfRange);
    }
    if !active_options(ADDRESS_OPTION_MAX_VALUE, options) {
        return Err(OptionsError::NotPossible);
    }
    Ok(options)
}

/// Collect validation problems for a broadcast. Reason strings are part of
/// the ledger contract.
#[allow(clippy::too_many_arguments)]
pub fn validate(
    db: &Connection,
    ctx: &ParserContext,
    source: &str,
    timestamp: i128,
    value: Option<f64>,
    fee_fraction_int: i128,
    text: &str,
    mime_type: &str,
) -> AppResult<Vec<String>> {
    let mut problems = Vec::new();

    let value_overflows = value.is_some_and(|v| v > MAX_INT as f64);
    if timestamp > i128::from(MAX_INT) || value_overflows || fee_fraction_int > i128::from(MAX_INT)
    {
        problems.push("integer overflow".to_string());
    }

    if ctx.protocol.enabled("max_fee_fraction", None) {
        if fee_fraction_int >= i128::from(UNIT) {
            problems.push("fee fraction greater than or equal to 1".to_string());
        }
    } else if fee_fraction_int > 4_294_967_295 {
        problems.push("fee fraction greater than 42.94967295".to_string());
    }

    if timestamp < 0 {
        problems.push("negative timestamp".to_string());
    }

    if source.is_empty() {
        problems.push("null source address".to_string());
    }

    // Check previous broadcast in this feed.
    if let Some(last_broadcast) = get_last_broadcast(db, source)? {
        if last_broadcast.locked {
            problems.push("locked feed".to_string());
        } else if timestamp <= i128::from(last_broadcast.timestamp) {
            problems.push("feed timestamps not monotonically increasing".to_string());
        }
    }

    if !ctx.protocol.enabled("no_zero_expiration", None) && text.len() > 52 {
        problems.push("text too long".to_string());
    }

    if ctx.protocol.enabled("options_require_memo", None)
        && !text.is_empty()
        && text.to_lowercase().starts_with("options")
    {
        match parse_options_from_string(text) {
            Ok(Some(options)) => {
                if let Err(e) = validate_address_options(options) {
                    problems.push(e.to_string());
                }
            }
            Ok(None) => {}
            Err(e) => problems.push(e.to_string()),
        }
    }

    if ctx.protocol.enabled("taproot_support", None) {
        problems.extend(check_content(mime_type, Some(text)));
    }

    Ok(problems)
}

/// Author a broadcast transaction. Fails on validation problems unless
/// `skip_validation`; the replay path never calls this.
#[allow(clippy::too_many_arguments)]
pub fn compose(
    db: &Connection,
    ctx: &ParserContext,
    source: &str,
    timestamp: i64,
    value: f64,
    fee_fraction: f64,
    text: &str,
    mime_type: &str,
    skip_validation: bool,
) -> AppResult<(String, Vec<(String, u64)>, Vec<u8>)> {
    // Store the fee fraction as an integer.
    let fee_fraction_int = (fee_fraction * 1e8) as i64;

    let mut broadcast_timestamp = timestamp;
    if timestamp == 0 {
        if let Some(last_broadcast) = get_last_broadcast(db, source)? {
            broadcast_timestamp = last_broadcast.timestamp + 1;
        }
    }

    let problems = validate(
        db,
        ctx,
        source,
        i128::from(broadcast_timestamp),
        Some(value),
        i128::from(fee_fraction_int),
        text,
        mime_type,
    )?;
    if !problems.is_empty() && !skip_validation {
        return Err(ComposeError::new(problems).into());
    }

    let height = ctx.state.current_block_index();
    let mut data = codec::pack_message_type(&ctx.protocol, MESSAGE_TYPE_ID, height);
    if ctx.protocol.enabled("taproot_support", None) {
        data.extend(
            broadcast_codec::pack_taproot(
                broadcast_timestamp,
                value,
                fee_fraction_int,
                mime_type,
                text,
            )
            .map_err(|e| ComposeError::single(&e.to_string()))?,
        );
    } else {
        data.extend(
            broadcast_codec::pack_legacy(
                &ctx.protocol,
                timestamp,
                value,
                fee_fraction_int,
                text,
                height,
            )
            .map_err(|e| ComposeError::single(&e.to_string()))?,
        );
    }

    Ok((source.to_string(), Vec::new(), data))
}

/// Ledger transition for one broadcast transaction.
pub fn parse(db: &Connection, ctx: &ParserContext, tx: &TransactionContext, message: &[u8]) -> AppResult<()> {
    // Unpack message.
    let (mut timestamp, mut value, fee_fraction_raw, mime_type, mut text, mut status) =
        match broadcast_codec::unpack(&ctx.protocol, message, tx.block_index) {
            Ok(data) => (
                data.timestamp,
                data.value,
                data.fee_fraction_int,
                data.mime_type,
                Some(data.text),
                "valid".to_string(),
            ),
            Err(CodecError::CouldNotUnpackText) => (
                0,
                None,
                0,
                String::new(),
                None,
                "invalid: could not unpack text".to_string(),
            ),
            Err(_) => (
                0,
                None,
                0,
                String::new(),
                None,
                "invalid: could not unpack".to_string(),
            ),
        };

    if status == "valid" {
        timestamp = timestamp.min(i128::from(MAX_INT));
        value = value.map(|v| v.min(MAX_INT as f64));

        let problems = validate(
            db,
            ctx,
            &tx.source,
            timestamp,
            value,
            fee_fraction_raw,
            text.as_deref().unwrap_or(""),
            &mime_type,
        )?;
        if !problems.is_empty() {
            status = format!("invalid: {}", problems.join("; "));
        }
    }

    let mut fee_fraction_int = i64::try_from(fee_fraction_raw).ok();

    // Lock?
    let locked = matches!(
        BroadcastPayload::classify(value, text.as_deref()),
        BroadcastPayload::Lock
    );
    if locked {
        timestamp = 0;
        value = None;
        fee_fraction_int = None;
        text = None;
    }

    // Negative timestamps are invalid but still recorded; saturate into
    // the storable range.
    let timestamp = timestamp.clamp(i128::from(i64::MIN), i128::from(MAX_INT)) as i64;

    let broadcast = Broadcast {
        tx_index: tx.tx_index,
        tx_hash: tx.tx_hash.clone(),
        block_index: tx.block_index,
        source: tx.source.clone(),
        timestamp,
        value,
        fee_fraction_int,
        text: text.clone(),
        mime_type,
        locked,
        status: status.clone(),
    };
    if !status.contains("integer overflow") {
        insert_broadcast(db, &broadcast)?;
    }

    info!(
        "Broadcast from {} ({}) [{}]",
        tx.source, tx.tx_hash, status
    );

    // Stop processing if broadcast is invalid for any reason.
    if ctx.protocol.enabled("broadcast_invalid_check", None) && status != "valid" {
        return Ok(());
    }

    // Options? Parse failures here were already flagged by validation.
    if ctx.protocol.enabled("options_require_memo", None) {
        if let Some(text) = text.as_deref() {
            if !text.is_empty() && text.to_lowercase().starts_with("options") {
                if let Ok(Some(options)) = parse_options_from_string(text) {
                    if let Ok(options) = i64::try_from(options) {
                        upsert_address_options(db, tx.block_index, &tx.source, options)?;
                    }
                }
            }
        }
    }

    let price = match BroadcastPayload::classify(value, text.as_deref()) {
        BroadcastPayload::CancelBets => {
            for bet in get_bets_by_feed(db, &tx.source, "open")? {
                cancel_bet(db, &bet, "dropped", tx.block_index, tx.tx_index)?;
            }
            return Ok(());
        }
        BroadcastPayload::CancelPendingMatches => {
            for bet_match in get_pending_bet_matches(db, &tx.source)? {
                cancel_bet_match(db, &bet_match, "dropped", tx.block_index, tx.tx_index)?;
            }
            return Ok(());
        }
        BroadcastPayload::Inert | BroadcastPayload::Lock => return Ok(()),
        BroadcastPayload::Price(price) => price,
    };

    // Pre-broadcast_invalid_check stop, kept for replay fidelity.
    if ctx.protocol.enabled("max_fee_fraction", None) && status != "valid" {
        return Ok(());
    }

    // Handle bet matches that use this feed.
    let fee_fraction_current = fee_fraction_int.unwrap_or(0);
    for bet_match in get_pending_bet_matches(db, &tx.source)? {
        settle_bet_match(
            db,
            ctx,
            tx,
            &bet_match,
            price,
            timestamp,
            fee_fraction_current,
        )?;
    }

    Ok(())
}

/// Settle, liquidate, or skip one pending bet match against a feed price.
fn settle_bet_match(
    db: &Connection,
    ctx: &ParserContext,
    tx: &TransactionContext,
    bet_match: &BetMatch,
    value: f64,
    timestamp: i64,
    fee_fraction_current: i64,
) -> AppResult<()> {
    let bet_match_id = make_id(&bet_match.tx0_hash, &bet_match.tx1_hash);

    // Escrow and fee for this match; escrow less fee is what goes back to
    // the betters.
    let total_escrow = bet_match.forward_quantity + bet_match.backward_quantity;
    let fee_fraction_int = if ctx.protocol.enabled("inmutable_fee_fraction", None) {
        bet_match.fee_fraction_int
    } else {
        fee_fraction_current
    };
    let fee = truncated_fee(fee_fraction_int, total_escrow);
    let escrow_less_fee = total_escrow - fee;

    let bet_match_type_id = bet_match.tx0_bet_type + bet_match.tx1_bet_type;
    let mut bet_match_status: Option<String> = None;

    if bet_match_type_id == CFD_TYPE_ID {
        // Recognise tx0, tx1 as the bull, bear (in the right direction).
        let (bull_address, bear_address, bear_escrow) =
            if bet_match.tx0_bet_type < bet_match.tx1_bet_type {
                (
                    &bet_match.tx0_address,
                    &bet_match.tx1_address,
                    bet_match.backward_quantity,
                )
            } else {
                (
                    &bet_match.tx1_address,
                    &bet_match.tx0_address,
                    bet_match.forward_quantity,
                )
            };

        let (Some(value_r), Some(initial_r)) = (
            rational_from_f64(value),
            rational_from_f64(bet_match.initial_value),
        ) else {
            // Non-finite feed values cannot settle anything
            return Ok(());
        };
        let leverage = BigRational::new(BigInt::from(bet_match.leverage), BigInt::from(5040));
        let unit = BigRational::from_integer(BigInt::from(UNIT));

        let bear_credit_r = BigRational::from_integer(BigInt::from(bear_escrow))
            - (value_r - initial_r) * leverage * unit;
        let bull_credit_r =
            BigRational::from_integer(BigInt::from(escrow_less_fee)) - bear_credit_r.clone();
        let bear_credit = round_half_even(&bear_credit_r);
        let bull_credit = round_half_even(&bull_credit_r);

        let escrow_less_fee_big = BigInt::from(escrow_less_fee);

        // Liquidate, as necessary.
        if bull_credit >= escrow_less_fee_big || !bull_credit.is_positive() {
            let (bull_final, bear_final) = if bull_credit >= escrow_less_fee_big {
                let status = "settled: liquidated for bull".to_string();
                credit(
                    db,
                    tx.block_index,
                    bull_address,
                    XCP,
                    escrow_less_fee,
                    tx.tx_index,
                    &format!("bet {status}"),
                    &tx.tx_hash,
                )?;
                bet_match_status = Some(status);
                (escrow_less_fee, 0)
            } else {
                let status = "settled: liquidated for bear".to_string();
                credit(
                    db,
                    tx.block_index,
                    bear_address,
                    XCP,
                    escrow_less_fee,
                    tx.tx_index,
                    &format!("bet {status}"),
                    &tx.tx_hash,
                )?;
                bet_match_status = Some(status);
                (0, escrow_less_fee)
            };

            // Pay fee to feed.
            credit(
                db,
                tx.block_index,
                &bet_match.feed_address,
                XCP,
                fee,
                tx.tx_index,
                "feed fee",
                &tx.tx_hash,
            )?;

            insert_bet_match_resolution(
                db,
                &BetMatchResolution {
                    bet_match_id: bet_match_id.clone(),
                    bet_match_type_id,
                    block_index: tx.block_index,
                    settled: Some(false),
                    bull_credit: Some(bull_final),
                    bear_credit: Some(bear_final),
                    winner: None,
                    escrow_less_fee: None,
                    fee,
                },
            )?;
            debug!("Bet Match {} resolved", bet_match_id);
        } else if timestamp >= bet_match.deadline {
            // Settle.
            let status = "settled".to_string();
            let bull_final = credit_to_i64(&bull_credit);
            let bear_final = credit_to_i64(&bear_credit);

            credit(
                db,
                tx.block_index,
                bull_address,
                XCP,
                bull_final,
                tx.tx_index,
                &format!("bet {status}"),
                &tx.tx_hash,
            )?;
            credit(
                db,
                tx.block_index,
                bear_address,
                XCP,
                bear_final,
                tx.tx_index,
                &format!("bet {status}"),
                &tx.tx_hash,
            )?;

            // Pay fee to feed.
            credit(
                db,
                tx.block_index,
                &bet_match.feed_address,
                XCP,
                fee,
                tx.tx_index,
                "feed fee",
                &tx.tx_hash,
            )?;

            insert_bet_match_resolution(
                db,
                &BetMatchResolution {
                    bet_match_id: bet_match_id.clone(),
                    bet_match_type_id,
                    block_index: tx.block_index,
                    settled: Some(true),
                    bull_credit: Some(bull_final),
                    bear_credit: Some(bear_final),
                    winner: None,
                    escrow_less_fee: None,
                    fee,
                },
            )?;
            bet_match_status = Some(status);
            debug!("Bet Match {} resolved", bet_match_id);
        }
    } else if bet_match_type_id == EQUAL_TYPE_ID && timestamp >= bet_match.deadline {
        let (equal_address, notequal_address) = if bet_match.tx0_bet_type < bet_match.tx1_bet_type {
            (&bet_match.tx0_address, &bet_match.tx1_address)
        } else {
            (&bet_match.tx1_address, &bet_match.tx0_address)
        };

        // Decide who won, and credit appropriately.
        let target_hit = bet_match.target_value.is_some_and(|target| value == target);
        let (winner, status, winner_address) = if target_hit {
            ("Equal", "settled: for equal".to_string(), equal_address)
        } else {
            (
                "NotEqual",
                "settled: for notequal".to_string(),
                notequal_address,
            )
        };
        credit(
            db,
            tx.block_index,
            winner_address,
            XCP,
            escrow_less_fee,
            tx.tx_index,
            &format!("bet {status}"),
            &tx.tx_hash,
        )?;

        // Pay fee to feed.
        credit(
            db,
            tx.block_index,
            &bet_match.feed_address,
            XCP,
            fee,
            tx.tx_index,
            "feed fee",
            &tx.tx_hash,
        )?;

        insert_bet_match_resolution(
            db,
            &BetMatchResolution {
                bet_match_id: bet_match_id.clone(),
                bet_match_type_id,
                block_index: tx.block_index,
                settled: None,
                bull_credit: None,
                bear_credit: None,
                winner: Some(winner.to_string()),
                escrow_less_fee: Some(escrow_less_fee),
                fee,
            },
        )?;
        bet_match_status = Some(status);
        debug!("Bet Match {} resolved", bet_match_id);
    }

    if let Some(bet_match_status) = bet_match_status {
        update_bet_match_status(db, tx.block_index, &bet_match_id, &bet_match_status)?;
        info!("Bet Match {} updated [{}]", bet_match_id, bet_match_status);
    }

    Ok(())
}
