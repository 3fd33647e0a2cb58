/// Paginated, deduplicated token-account fetcher (SPEC_FULL.md §4.3, C3).
///
/// An owner can hold accounts under both the classic SPL Token program and
/// Token-2022, so this module runs the cursor loop once per program id and
/// folds the results together, deduping by account pubkey. Each program's
/// loop repeatedly calls `getTokenAccountsByOwnerV2`, threading `nextCursor`
/// forward until `hasMore=false` (§4.3 operation contract, §8 testable
/// property 7).
use std::collections::HashSet;

use tracing::warn;

use crate::errors::{WarchestError, WarchestResult};
use crate::rpc::{PageResult, RawTokenAccount, RpcApi};

/// Token-2022 has no stable crate of its own in this stack, so its program id
/// stays a literal; the classic program id comes straight from `spl-token`
/// rather than being retyped by hand.
pub const TOKEN_2022_PROGRAM_ID: &str = "TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb";

pub fn spl_token_program_id() -> String {
    spl_token::id().to_string()
}

pub const DEFAULT_PAGE_LIMIT: usize = 500;
pub const DEFAULT_PAGE_CAP: usize = 10;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenAccountsResult {
    pub accounts: Vec<RawTokenAccount>,
    pub page_count: usize,
    pub total_count: u64,
    pub truncated: bool,
    pub saw_token22: bool,
}

/// Fetches every token account owned by `owner` across the classic and
/// Token-2022 programs, deduplicating by account pubkey (§4.3).
pub async fn fetch_all_token_accounts(
    rpc: &(dyn RpcApi + Send + Sync),
    owner: &str,
) -> WarchestResult<TokenAccountsResult> {
    if owner.is_empty() {
        return Err(WarchestError::invalid_argument("owner must not be empty"));
    }

    let mut seen = HashSet::new();
    let mut accounts = Vec::new();
    let mut page_count = 0usize;
    let mut total_count = 0u64;
    let mut truncated = false;
    let mut saw_token22 = false;

    let classic = spl_token_program_id();
    let programs = [classic.as_str(), TOKEN_2022_PROGRAM_ID];

    for (idx, program_id) in programs.iter().enumerate() {
        let page = fetch_program_pages(rpc, owner, program_id, &mut page_count).await?;
        if page.truncated {
            truncated = true;
        }
        total_count += page.total_count;
        if idx == 1 && !page.accounts.is_empty() {
            saw_token22 = true;
        }
        for account in page.accounts {
            if seen.insert(account.pubkey.clone()) {
                accounts.push(account);
            }
        }
    }

    Ok(TokenAccountsResult {
        accounts,
        page_count,
        total_count,
        truncated,
        saw_token22,
    })
}

struct ProgramPages {
    accounts: Vec<RawTokenAccount>,
    total_count: u64,
    truncated: bool,
}

/// Runs the cursor loop for a single program id, threading `next_cursor`
/// forward and stopping on `has_more=false` or a missing cursor. `page_count`
/// is a running total shared across both programs, since `pageLimit` bounds
/// the whole fetch, not each program individually.
async fn fetch_program_pages(
    rpc: &(dyn RpcApi + Send + Sync),
    owner: &str,
    program_id: &str,
    page_count: &mut usize,
) -> WarchestResult<ProgramPages> {
    let mut accounts = Vec::new();
    let mut cursor: Option<String> = None;
    let mut total_count = 0u64;
    let mut truncated = false;

    loop {
        if *page_count >= DEFAULT_PAGE_CAP {
            if cursor.is_some() {
                truncated = true;
                warn!(owner, program_id, *page_count, "token account page cap reached");
            }
            break;
        }

        let page: PageResult = rpc
            .get_token_accounts_page(owner, program_id, cursor.as_deref(), DEFAULT_PAGE_LIMIT)
            .await?;
        *page_count += 1;
        if let Some(count) = page.total_count {
            total_count = count;
        }
        accounts.extend(page.accounts);

        if !page.has_more {
            break;
        }
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => {
                // hasMore=true with no cursor to resume from (§4.3).
                truncated = true;
                warn!(owner, program_id, "pagination truncated: hasMore with no cursor");
                break;
            }
        }
    }

    Ok(ProgramPages {
        accounts,
        total_count,
        truncated,
    })
}
