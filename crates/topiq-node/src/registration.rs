//! Start-up reconciliation of on-chain topic registration.
//!
//! Desired topics come from configuration; on-chain topics from the ledger.
//! A node with no registration at all pays the initial stake on its first
//! `MsgRegister`; a registered node only sends the difference.

use serde::Serialize;

use topiq_ledger_client::LedgerError;
use topiq_protocol::{
    message::{MsgRegister, MsgRemoveRegistration},
    types::PageRequest,
    ReconciliationPlan, TopicId, TopicSet, TxMsg, BALANCE_PAGE_LIMIT,
};

use crate::{error::RegistrationError, pipeline::Pipeline, submit::cancellable};

#[derive(Debug, Clone)]
pub struct RegistrationSettings {
    /// Raw configured topic ids; non-numeric entries are ignored.
    pub topics: Vec<String>,
    pub initial_stake: u128,
    pub stake_denom: String,
    pub multiaddr: String,
}

/// Transactions sent by one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub registered: Vec<TopicId>,
    pub deregistered: Vec<TopicId>,
    /// Set only when this pass performed the first, staked registration.
    pub initial_stake: Option<u128>,
}

pub async fn reconcile(
    ctx: &Pipeline,
    settings: &RegistrationSettings,
) -> Result<ReconcileReport, RegistrationError> {
    let (desired, rejected) = TopicSet::parse_lossy(&settings.topics);
    for err in &rejected {
        tracing::warn!(error = %err, "Ignoring configured topic");
    }

    let address = &ctx.identity.address;
    let is_reputer = ctx.identity.role.is_reputer();

    let on_chain: TopicSet = cancellable(
        &ctx.cancel,
        ctx.ledger.registered_topic_ids(address, is_reputer),
    )
    .await
    .map_err(|source| {
        tracing::error!(address = %address, error = %source, "Could not fetch registered topics");
        RegistrationError::FetchTopics { address: address.clone(), source }
    })?
    .into_iter()
    .collect();

    tracing::info!(
        address   = %address,
        desired   = ?desired.to_vec(),
        on_chain  = ?on_chain.to_vec(),
        "Reconciling topic registration",
    );

    if on_chain.is_empty() {
        register_first(ctx, settings, &desired).await
    } else {
        update_registration(ctx, settings, &desired, &on_chain).await
    }
}

async fn update_registration(
    ctx: &Pipeline,
    settings: &RegistrationSettings,
    desired: &TopicSet,
    on_chain: &TopicSet,
) -> Result<ReconcileReport, RegistrationError> {
    let plan = ReconciliationPlan::between(desired, on_chain);
    let mut report = ReconcileReport::default();
    if plan.is_noop() {
        tracing::info!("Topic registration already up to date");
        return Ok(report);
    }

    if !plan.to_register.is_empty() {
        let msg = register_msg(ctx, settings, plan.to_register.clone(), None);
        submit(ctx, &msg).await.map_err(|e| {
            tracing::error!(topics = ?plan.to_register, error = %e, "Register transaction failed");
            RegistrationError::Register(e)
        })?;
        report.registered = plan.to_register;
    }

    // Sequential; the first failure leaves later topics registered.
    for topic_id in plan.to_deregister {
        let msg = TxMsg::RemoveRegistration(MsgRemoveRegistration {
            sender: ctx.identity.address.clone(),
            topic_id,
            is_reputer: ctx.identity.role.is_reputer(),
        });
        submit(ctx, &msg).await.map_err(|source| {
            tracing::error!(topic = topic_id, error = %source, "Deregistration failed");
            RegistrationError::Deregister { topic_id, source }
        })?;
        tracing::info!(topic = topic_id, "Removed topic registration");
        report.deregistered.push(topic_id);
    }

    Ok(report)
}

async fn register_first(
    ctx: &Pipeline,
    settings: &RegistrationSettings,
    desired: &TopicSet,
) -> Result<ReconcileReport, RegistrationError> {
    let address = &ctx.identity.address;
    let page = PageRequest { limit: BALANCE_PAGE_LIMIT, offset: 0 };

    let coins = cancellable(&ctx.cancel, ctx.ledger.bank_balances(address, page))
        .await
        .map_err(|source| {
            tracing::error!(address = %address, error = %source, "Could not list balances");
            RegistrationError::FetchBalances { address: address.clone(), source }
        })?;

    if coins.is_empty() {
        tracing::error!(address = %address, "Account has no balances; cannot stake");
        return Err(RegistrationError::AccountUnfunded { address: address.clone() });
    }

    let balance = coins
        .iter()
        .find(|c| c.denom == settings.stake_denom)
        .map(|c| c.amount)
        .unwrap_or(0);
    if balance < settings.initial_stake {
        tracing::error!(
            address  = %address,
            denom    = %settings.stake_denom,
            balance,
            required = settings.initial_stake,
            "Insufficient balance for initial stake",
        );
        return Err(RegistrationError::InsufficientStake {
            balance,
            required: settings.initial_stake,
        });
    }

    if desired.is_empty() {
        tracing::warn!("No valid topics configured; skipping first registration");
        return Err(RegistrationError::NothingToRegister);
    }

    let topics = desired.to_vec();
    let msg = register_msg(ctx, settings, topics.clone(), Some(settings.initial_stake));
    submit(ctx, &msg).await.map_err(|e| {
        tracing::error!(topics = ?topics, error = %e, "Initial register transaction failed");
        RegistrationError::Register(e)
    })?;

    tracing::info!(
        topics        = ?topics,
        initial_stake = settings.initial_stake,
        "Registered node with initial stake",
    );
    Ok(ReconcileReport {
        registered: topics,
        deregistered: Vec::new(),
        initial_stake: Some(settings.initial_stake),
    })
}

fn register_msg(
    ctx: &Pipeline,
    settings: &RegistrationSettings,
    topic_ids: Vec<TopicId>,
    initial_stake: Option<u128>,
) -> TxMsg {
    TxMsg::Register(MsgRegister {
        sender: ctx.identity.address.clone(),
        libp2p_key: ctx.identity.peer_id.to_base58(),
        multi_address: settings.multiaddr.clone(),
        topic_ids,
        initial_stake,
        owner: ctx.identity.address.clone(),
        is_reputer: ctx.identity.role.is_reputer(),
    })
}

async fn submit(ctx: &Pipeline, msg: &TxMsg) -> Result<(), LedgerError> {
    if !ctx.submit_tx {
        tracing::info!(
            kind = msg.kind(),
            msg  = %serde_json::to_string(msg).unwrap_or_default(),
            "Dry run: transaction not broadcast",
        );
        return Ok(());
    }
    ctx.send(msg).await.map(|_| ())
}
