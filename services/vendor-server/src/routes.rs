//! Router and handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use vendor_engine::{
    Address, LedgerEntry, NativeAmount, Payout, Receipt, ReserveState, SupplyAudit, TokenAmount,
    Vendor, VendorError, VendorEvent,
};

use crate::error::ApiError;

type AppState = Arc<Vendor>;

pub fn router(vendor: Arc<Vendor>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        // Vendor endpoints
        .route("/v1/vendor", get(vendor_info))
        .route("/v1/vendor/reserve", get(reserve))
        .route("/v1/vendor/audit", get(audit))
        .route("/v1/vendor/quote/buy", get(quote_buy))
        .route("/v1/vendor/quote/sell", get(quote_sell))
        .route("/v1/vendor/buy", post(buy))
        .route("/v1/vendor/sell", post(sell))
        .route("/v1/vendor/withdraw", post(withdraw))
        .route("/v1/vendor/ownership", post(transfer_ownership))
        .route("/v1/vendor/payouts", get(recent_payouts))
        // Token endpoints
        .route("/v1/token/balance/:account", get(balance))
        .route("/v1/token/allowance/:owner/:spender", get(allowance))
        .route("/v1/token/allowances/:owner", get(allowances))
        .route("/v1/token/holders", get(holders))
        .route("/v1/token/approve", post(approve))
        .route("/v1/token/transfer", post(transfer))
        .route("/v1/token/transfer_from", post(transfer_from))
        // History endpoints
        .route("/v1/ledger/entries/:account", get(account_entries))
        .route("/v1/ledger/recent", get(recent_entries))
        .route("/v1/events/recent", get(recent_events))
        .route("/v1/events/:account", get(account_events))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(vendor)
}

// ============================================================================
// Root Handlers
// ============================================================================

async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "Token Vendor",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Fixed-rate token vending machine",
    }))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "healthy"}))
}

// ============================================================================
// Vendor Handlers
// ============================================================================

#[derive(Debug, Serialize)]
struct VendorInfo {
    vendor_address: Address,
    owner: Address,
    name: String,
    symbol: String,
    decimals: u8,
    total_supply: TokenAmount,
    tokens_per_rate_unit: u128,
    native_per_rate_unit: u128,
}

async fn vendor_info(State(vendor): State<AppState>) -> Json<VendorInfo> {
    let token = vendor.token_metadata();
    let pricing = vendor.pricing();
    Json(VendorInfo {
        vendor_address: vendor.address().clone(),
        owner: vendor.owner(),
        name: token.name.clone(),
        symbol: token.symbol.clone(),
        decimals: token.decimals,
        total_supply: vendor.total_supply(),
        tokens_per_rate_unit: pricing.tokens(),
        native_per_rate_unit: pricing.native(),
    })
}

async fn reserve(State(vendor): State<AppState>) -> Json<ReserveState> {
    Json(vendor.reserve_state())
}

async fn audit(State(vendor): State<AppState>) -> Result<Json<SupplyAudit>, ApiError> {
    Ok(Json(vendor.audit()?))
}

#[derive(Debug, Deserialize)]
struct QuoteQuery {
    /// Decimal string; amounts may exceed what query parsers take as integers
    amount: String,
}

impl QuoteQuery {
    fn amount(&self) -> Result<u128, ApiError> {
        self.amount.trim().parse().map_err(|_| {
            ApiError(VendorError::invalid_amount(format!(
                "cannot parse '{}' as an amount",
                self.amount
            )))
        })
    }
}

#[derive(Debug, Serialize)]
struct QuoteResponse {
    native_amount: NativeAmount,
    token_amount: TokenAmount,
}

async fn quote_buy(
    State(vendor): State<AppState>,
    Query(query): Query<QuoteQuery>,
) -> Result<Json<QuoteResponse>, ApiError> {
    let native_amount = NativeAmount::new(query.amount()?);
    let token_amount = vendor.quote_buy(native_amount)?;
    Ok(Json(QuoteResponse {
        native_amount,
        token_amount,
    }))
}

async fn quote_sell(
    State(vendor): State<AppState>,
    Query(query): Query<QuoteQuery>,
) -> Result<Json<QuoteResponse>, ApiError> {
    let token_amount = TokenAmount::new(query.amount()?);
    let native_amount = vendor.quote_sell(token_amount)?;
    Ok(Json(QuoteResponse {
        native_amount,
        token_amount,
    }))
}

#[derive(Debug, Deserialize)]
struct BuyRequest {
    buyer: String,
    native_amount: u128,
}

async fn buy(
    State(vendor): State<AppState>,
    Json(req): Json<BuyRequest>,
) -> Result<Json<Receipt>, ApiError> {
    let buyer = Address::from_string(req.buyer);
    Ok(Json(vendor.buy(&buyer, NativeAmount::new(req.native_amount))?))
}

#[derive(Debug, Deserialize)]
struct SellRequest {
    seller: String,
    token_amount: u128,
}

async fn sell(
    State(vendor): State<AppState>,
    Json(req): Json<SellRequest>,
) -> Result<Json<Receipt>, ApiError> {
    let seller = Address::from_string(req.seller);
    Ok(Json(vendor.sell(&seller, TokenAmount::new(req.token_amount))?))
}

#[derive(Debug, Deserialize)]
struct WithdrawRequest {
    caller: String,
    /// Omitted to withdraw the whole native reserve
    native_amount: Option<u128>,
}

async fn withdraw(
    State(vendor): State<AppState>,
    Json(req): Json<WithdrawRequest>,
) -> Result<Json<Receipt>, ApiError> {
    let caller = Address::from_string(req.caller);
    let receipt = match req.native_amount {
        Some(amount) => vendor.withdraw(&caller, NativeAmount::new(amount))?,
        None => vendor.withdraw_all(&caller)?,
    };
    Ok(Json(receipt))
}

#[derive(Debug, Deserialize)]
struct OwnershipRequest {
    caller: String,
    new_owner: String,
}

async fn transfer_ownership(
    State(vendor): State<AppState>,
    Json(req): Json<OwnershipRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let caller = Address::from_string(req.caller);
    let new_owner = Address::from_string(req.new_owner);
    vendor.transfer_ownership(&caller, &new_owner)?;
    Ok(Json(serde_json::json!({
        "success": true,
        "owner": new_owner.as_str(),
    })))
}

// ============================================================================
// Token Handlers
// ============================================================================

#[derive(Debug, Serialize)]
struct BalanceResponse {
    account: String,
    balance: TokenAmount,
    formatted: String,
}

async fn balance(
    State(vendor): State<AppState>,
    Path(account): Path<String>,
) -> Json<BalanceResponse> {
    let balance = vendor.balance_of(&Address::from_string(account.clone()));
    Json(BalanceResponse {
        account,
        balance,
        formatted: vendor.token_metadata().format(balance),
    })
}

#[derive(Debug, Serialize)]
struct AllowanceResponse {
    owner: String,
    spender: String,
    allowance: TokenAmount,
}

async fn allowance(
    State(vendor): State<AppState>,
    Path((owner, spender)): Path<(String, String)>,
) -> Json<AllowanceResponse> {
    let allowance = vendor.allowance_of(
        &Address::from_string(owner.clone()),
        &Address::from_string(spender.clone()),
    );
    Json(AllowanceResponse {
        owner,
        spender,
        allowance,
    })
}

#[derive(Debug, Serialize)]
struct GrantedAllowance {
    spender: Address,
    allowance: TokenAmount,
}

#[derive(Debug, Serialize)]
struct AllowancesResponse {
    owner: String,
    allowances: Vec<GrantedAllowance>,
}

async fn allowances(
    State(vendor): State<AppState>,
    Path(owner): Path<String>,
) -> Json<AllowancesResponse> {
    let allowances = vendor
        .allowances_of(&Address::from_string(owner.clone()))
        .into_iter()
        .map(|(spender, allowance)| GrantedAllowance { spender, allowance })
        .collect();
    Json(AllowancesResponse { owner, allowances })
}

#[derive(Debug, Serialize)]
struct HolderBalance {
    account: Address,
    balance: TokenAmount,
}

#[derive(Debug, Serialize)]
struct HoldersResponse {
    count: usize,
    holders: Vec<HolderBalance>,
}

async fn holders(State(vendor): State<AppState>) -> Json<HoldersResponse> {
    let holders: Vec<_> = vendor
        .holders()
        .into_iter()
        .map(|(account, balance)| HolderBalance { account, balance })
        .collect();
    Json(HoldersResponse {
        count: holders.len(),
        holders,
    })
}

#[derive(Debug, Deserialize)]
struct ApproveRequest {
    owner: String,
    spender: String,
    amount: u128,
}

#[derive(Debug, Serialize)]
struct ApproveResponse {
    success: bool,
    allowance: TokenAmount,
    previous: TokenAmount,
}

async fn approve(
    State(vendor): State<AppState>,
    Json(req): Json<ApproveRequest>,
) -> Result<Json<ApproveResponse>, ApiError> {
    let owner = Address::from_string(req.owner);
    let spender = Address::from_string(req.spender);
    let allowance = TokenAmount::new(req.amount);
    let previous = vendor.authorize(&owner, &spender, allowance)?;
    Ok(Json(ApproveResponse {
        success: true,
        allowance,
        previous,
    }))
}

#[derive(Debug, Deserialize)]
struct TransferRequest {
    from: String,
    to: String,
    amount: u128,
}

async fn transfer(
    State(vendor): State<AppState>,
    Json(req): Json<TransferRequest>,
) -> Result<Json<Receipt>, ApiError> {
    let from = Address::from_string(req.from);
    let to = Address::from_string(req.to);
    Ok(Json(vendor.transfer(&from, &to, TokenAmount::new(req.amount))?))
}

#[derive(Debug, Deserialize)]
struct TransferFromRequest {
    spender: String,
    owner: String,
    to: String,
    amount: u128,
}

async fn transfer_from(
    State(vendor): State<AppState>,
    Json(req): Json<TransferFromRequest>,
) -> Result<Json<Receipt>, ApiError> {
    let spender = Address::from_string(req.spender);
    let owner = Address::from_string(req.owner);
    let to = Address::from_string(req.to);
    Ok(Json(vendor.transfer_from(
        &spender,
        &owner,
        &to,
        TokenAmount::new(req.amount),
    )?))
}

// ============================================================================
// History Handlers
// ============================================================================

#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct EntriesResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    account: Option<String>,
    count: usize,
    entries: Vec<LedgerEntry>,
}

#[derive(Debug, Serialize)]
struct PayoutsResponse {
    count: usize,
    payouts: Vec<Payout>,
}

#[derive(Debug, Serialize)]
struct EventsResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    account: Option<String>,
    count: usize,
    events: Vec<VendorEvent>,
}

async fn account_entries(
    State(vendor): State<AppState>,
    Path(account): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Json<EntriesResponse> {
    let limit = query.limit.unwrap_or(50);
    let mut entries = vendor.account_entries(&Address::from_string(account.clone()));
    entries.reverse();
    entries.truncate(limit);

    Json(EntriesResponse {
        account: Some(account),
        count: entries.len(),
        entries,
    })
}

async fn recent_entries(
    State(vendor): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Json<EntriesResponse> {
    let entries = vendor.recent_entries(query.limit.unwrap_or(20));
    Json(EntriesResponse {
        account: None,
        count: entries.len(),
        entries,
    })
}

async fn recent_payouts(
    State(vendor): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Json<PayoutsResponse> {
    let payouts = vendor.recent_payouts(query.limit.unwrap_or(20));
    Json(PayoutsResponse {
        count: payouts.len(),
        payouts,
    })
}

async fn recent_events(
    State(vendor): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Json<EventsResponse> {
    let events = vendor.recent_events(query.limit.unwrap_or(20));
    Json(EventsResponse {
        account: None,
        count: events.len(),
        events,
    })
}

async fn account_events(
    State(vendor): State<AppState>,
    Path(account): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Json<EventsResponse> {
    let events = vendor.account_events(
        &Address::from_string(account.clone()),
        query.limit.unwrap_or(20),
    );
    Json(EventsResponse {
        account: Some(account),
        count: events.len(),
        events,
    })
}
