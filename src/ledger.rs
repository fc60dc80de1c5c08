use crate::error::{SyncError, SyncResult};
use crate::events::TransferRecord;
use crate::snapshot::Holder;
use alloy_primitives::{Address, I256, U256};
use std::collections::HashMap;

/// Signed per-address accumulator built from transfer events.
///
/// The zero address (mint source / burn sink) and the token contract itself
/// are never tracked. Accumulators may go negative while a window is being
/// replayed, for example when a seeded snapshot only knew the top holders;
/// [`BalanceLedger::into_ranked`] drops anything that is not positive.
#[derive(Debug, Clone)]
pub struct BalanceLedger {
    token: Address,
    balances: HashMap<Address, I256>,
    transfers_applied: u64,
}

impl BalanceLedger {
    pub fn new(token: Address) -> Self {
        Self {
            token,
            balances: HashMap::new(),
            transfers_applied: 0,
        }
    }

    pub fn is_tracked(&self, address: &Address) -> bool {
        *address != Address::ZERO && *address != self.token
    }

    /// Starts from the balances recorded in a previous snapshot.
    pub fn seed(&mut self, holders: &[Holder]) -> SyncResult<()> {
        for holder in holders {
            if self.is_tracked(&holder.address) {
                self.credit(holder.address, holder.balance)?;
            }
        }
        Ok(())
    }

    pub fn apply(&mut self, transfer: &TransferRecord) -> SyncResult<()> {
        if self.is_tracked(&transfer.from) {
            self.debit(transfer.from, transfer.value)?;
        }
        if self.is_tracked(&transfer.to) {
            self.credit(transfer.to, transfer.value)?;
        }
        self.transfers_applied += 1;
        Ok(())
    }

    pub fn apply_all<'a, I>(&mut self, transfers: I) -> SyncResult<()>
    where
        I: IntoIterator<Item = &'a TransferRecord>,
    {
        for transfer in transfers {
            self.apply(transfer)?;
        }
        Ok(())
    }

    pub fn transfers_applied(&self) -> u64 {
        self.transfers_applied
    }

    pub fn balance_of(&self, address: &Address) -> I256 {
        self.balances.get(address).copied().unwrap_or(I256::ZERO)
    }

    /// Positive balances, largest first; equal balances by ascending address.
    pub fn into_ranked(self) -> Vec<(Address, U256)> {
        let mut holders: Vec<(Address, U256)> = self
            .balances
            .into_iter()
            .filter(|(_, balance)| balance.is_positive())
            .map(|(address, balance)| (address, balance.into_raw()))
            .collect();

        holders.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        holders
    }

    fn signed(address: Address, value: U256) -> SyncResult<I256> {
        I256::try_from(value).map_err(|_| SyncError::BalanceOverflow(address))
    }

    fn credit(&mut self, address: Address, value: U256) -> SyncResult<()> {
        let delta = Self::signed(address, value)?;
        let balance = self.balances.entry(address).or_insert(I256::ZERO);
        *balance = balance
            .checked_add(delta)
            .ok_or(SyncError::BalanceOverflow(address))?;
        Ok(())
    }

    fn debit(&mut self, address: Address, value: U256) -> SyncResult<()> {
        let delta = Self::signed(address, value)?;
        let balance = self.balances.entry(address).or_insert(I256::ZERO);
        *balance = balance
            .checked_sub(delta)
            .ok_or(SyncError::BalanceOverflow(address))?;
        Ok(())
    }
}
