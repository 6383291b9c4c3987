use crate::session::ClaimRequest;
use ledger::{
    Address,
    ClaimReceipt,
    LedgerError,
    RewardLedger,
};
use std::sync::Arc;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClaimStage {
    Submitting,
    Confirming,
}

impl ClaimStage {
    pub fn message(self) -> &'static str {
        match self {
            ClaimStage::Submitting => "Claiming rewards...",
            ClaimStage::Confirming => "Confirming claim...",
        }
    }
}

/// Progress of a claim running off the UI task.
#[derive(Debug)]
pub enum ClaimUpdate {
    Stage {
        session_id: u64,
        stage: ClaimStage,
    },
    Finished {
        session_id: u64,
        claimant: Address,
        result: Result<ClaimReceipt, LedgerError>,
    },
}

pub struct ClaimSubmitter<L> {
    ledger: Arc<L>,
}

impl<L> Clone for ClaimSubmitter<L> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
        }
    }
}

impl<L: RewardLedger + 'static> ClaimSubmitter<L> {
    pub fn new(ledger: Arc<L>) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    /// Submits one claim for the whole tap count and waits for it to settle.
    pub async fn submit(
        &self,
        claimant: &Address,
        request: ClaimRequest,
        mut on_stage: impl FnMut(ClaimStage),
    ) -> Result<ClaimReceipt, LedgerError> {
        let taps = request.tap_count.get();
        on_stage(ClaimStage::Submitting);
        let pending = self.ledger.submit_claim(claimant, taps).await?;
        on_stage(ClaimStage::Confirming);
        let receipt = self.ledger.confirm(pending).await?;
        tracing::info!(
            taps,
            reward = %receipt.reward,
            address = %claimant,
            tx_id = %receipt.tx_id,
            "claim confirmed"
        );
        Ok(receipt)
    }

    pub fn spawn(
        &self,
        claimant: Address,
        request: ClaimRequest,
        updates: mpsc::UnboundedSender<ClaimUpdate>,
    ) -> JoinHandle<()> {
        let submitter = self.clone();
        tokio::spawn(async move {
            let session_id = request.session_id;
            let result = submitter
                .submit(&claimant, request, |stage| {
                    let _ = updates.send(ClaimUpdate::Stage { session_id, stage });
                })
                .await;
            if let Err(e) = &result {
                tracing::warn!(error = %e, address = %claimant, "claim failed");
            }
            let _ = updates.send(ClaimUpdate::Finished {
                session_id,
                claimant,
                result,
            });
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use ledger::{
        FailureKind,
        LedgerAdmin,
        LocalLedger,
        TokenAmount,
        TokenInfo,
    };
    use std::num::NonZeroU64;

    fn owner() -> Address {
        Address::new("0x01")
    }

    fn player() -> Address {
        Address::new("0xaa")
    }

    fn request(taps: u64) -> ClaimRequest {
        ClaimRequest {
            session_id: 1,
            tap_count: NonZeroU64::new(taps).unwrap(),
        }
    }

    async fn funded_ledger(whole_tokens: u128) -> Arc<LocalLedger> {
        let ledger = LocalLedger::in_memory(owner(), TokenInfo::whole_token_per_tap("TAP", 18));
        ledger
            .deposit(&owner(), TokenAmount::new(whole_tokens * 10u128.pow(18)))
            .await
            .unwrap();
        Arc::new(ledger)
    }

    #[tokio::test]
    async fn submit__reports_both_stages_in_order() {
        // given
        let submitter = ClaimSubmitter::new(funded_ledger(10).await);
        let mut stages = Vec::new();

        // when
        let receipt = submitter
            .submit(&player(), request(3), |stage| stages.push(stage))
            .await
            .unwrap();

        // then
        assert_eq!(stages, vec![ClaimStage::Submitting, ClaimStage::Confirming]);
        assert_eq!(receipt.reward, TokenAmount::new(3 * 10u128.pow(18)));
    }

    #[tokio::test]
    async fn submit__stops_after_rejected_submission() {
        let submitter = ClaimSubmitter::new(funded_ledger(1).await);
        let mut stages = Vec::new();

        let err = submitter
            .submit(&player(), request(2), |stage| stages.push(stage))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), FailureKind::LedgerUnderfunded);
        assert_eq!(stages, vec![ClaimStage::Submitting]);
    }

    #[tokio::test]
    async fn spawn__delivers_the_outcome_over_the_channel() {
        // given
        let submitter = ClaimSubmitter::new(funded_ledger(10).await);
        let (tx, mut rx) = mpsc::unbounded_channel();

        // when
        submitter.spawn(player(), request(4), tx).await.unwrap();

        // then
        let mut finished = None;
        while let Some(update) = rx.recv().await {
            if let ClaimUpdate::Finished { result, claimant, .. } = update {
                finished = Some((claimant, result));
            }
        }
        let (claimant, result) = finished.unwrap();
        assert_eq!(claimant, player());
        assert_eq!(result.unwrap().taps, 4);
    }
}
