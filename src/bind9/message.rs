// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! RFC 2136 UPDATE message construction.
//!
//! Both messages carry the zone in the zone section (class IN, type SOA) and
//! no prerequisites. A replace first deletes the whole A RRset of the name
//! (class ANY, TTL 0, empty RDATA) and then adds the single new A record, so
//! the name ends up with exactly one address regardless of prior state.

use anyhow::{Context, Result};
use hickory_client::op::{Message, MessageType, OpCode, Query, UpdateMessage};
use hickory_client::rr::{DNSClass, Name, RData, Record, RecordType};
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::constants::APEX_RECORD_NAME;

/// Absolute name of `zone`.
///
/// # Errors
///
/// Returns an error if `zone` is not a valid DNS name.
pub fn zone_name(zone: &str) -> Result<Name> {
    let zone = zone.trim_end_matches('.');
    Name::from_str(&format!("{zone}.")).with_context(|| format!("Invalid zone name: {zone}"))
}

/// Absolute owner name for a record `relative` to `zone`; `@` is the apex.
///
/// # Errors
///
/// Returns an error if the combined name is not a valid DNS name.
pub fn record_name(zone: &str, relative: &str) -> Result<Name> {
    if relative == APEX_RECORD_NAME || relative.is_empty() {
        return zone_name(zone);
    }

    let zone = zone.trim_end_matches('.');
    Name::from_str(&format!("{relative}.{zone}."))
        .with_context(|| format!("Invalid record name: {relative}.{zone}"))
}

fn update_message(zone: &str) -> Result<Message> {
    let mut zone_query = Query::new();
    zone_query
        .set_name(zone_name(zone)?)
        .set_query_class(DNSClass::IN)
        .set_query_type(RecordType::SOA);

    let mut message = Message::new();
    message
        .set_id(rand::random())
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Update)
        .set_recursion_desired(false);
    message.add_zone(zone_query);

    Ok(message)
}

fn delete_rrset(owner: Name) -> Record {
    let mut record = Record::with(owner, RecordType::A, 0);
    record.set_dns_class(DNSClass::ANY);
    record
}

/// UPDATE that makes `relative` in `zone` resolve to exactly `target`.
///
/// # Errors
///
/// Returns an error if the zone or record name is invalid.
pub fn build_replace_message(
    zone: &str,
    relative: &str,
    target: Ipv4Addr,
    ttl: u32,
) -> Result<Message> {
    let owner = record_name(zone, relative)?;
    let mut message = update_message(zone)?;

    let mut record = Record::from_rdata(owner.clone(), ttl, RData::A(target.into()));
    record.set_dns_class(DNSClass::IN);

    message.add_update(delete_rrset(owner));
    message.add_update(record);

    Ok(message)
}

/// UPDATE that removes every A record of `relative` in `zone`.
///
/// # Errors
///
/// Returns an error if the zone or record name is invalid.
pub fn build_delete_message(zone: &str, relative: &str) -> Result<Message> {
    let owner = record_name(zone, relative)?;
    let mut message = update_message(zone)?;

    message.add_update(delete_rrset(owner));

    Ok(message)
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod message_tests;
