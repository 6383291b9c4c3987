#![allow(non_snake_case)]

use integration_tests::TestContext;
use ledger::{
    FailureKind,
    LedgerAdmin,
    TokenAmount,
};

#[tokio::test]
async fn owner__is_the_deploying_profile() {
    let ctx = TestContext::new().await;

    assert_eq!(ctx.ledger().owner().await.unwrap(), ctx.owner);
}

#[tokio::test]
async fn deposit__tops_up_the_pool() {
    let ctx = TestContext::with_pool(0).await;

    let balance = ctx.ledger().deposit(&ctx.owner, ctx.tokens(25)).await.unwrap();

    assert_eq!(balance, ctx.tokens(25));
    assert_eq!(ctx.pool_balance().await, ctx.tokens(25));
}

#[tokio::test]
async fn deposit__rejects_zero_and_strangers() {
    let ctx = TestContext::with_pool(1).await;

    let zero = ctx.ledger().deposit(&ctx.owner, TokenAmount::ZERO).await;
    let stranger = ctx.ledger().deposit(&ctx.player, ctx.tokens(1)).await;

    assert_eq!(zero.unwrap_err().kind(), FailureKind::InvalidClaim);
    assert_eq!(stranger.unwrap_err().kind(), FailureKind::NotOwner);
    assert_eq!(ctx.pool_balance().await, ctx.tokens(1));
}

#[tokio::test]
async fn withdraw__returns_tokens_to_the_owner() {
    // given
    let ctx = TestContext::with_pool(10).await;

    // when
    let balance = ctx.ledger().withdraw(&ctx.owner, ctx.tokens(4)).await.unwrap();

    // then
    assert_eq!(balance, ctx.tokens(6));
    assert_eq!(ctx.holding_of(&ctx.owner), ctx.tokens(4));
}

#[tokio::test]
async fn withdraw__cannot_exceed_the_pool() {
    let ctx = TestContext::with_pool(10).await;

    let err = ctx
        .ledger()
        .withdraw(&ctx.owner, ctx.tokens(11))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "reverted: withdraw failed");
    assert_eq!(ctx.pool_balance().await, ctx.tokens(10));
}

#[tokio::test]
async fn withdraw__is_owner_only() {
    let ctx = TestContext::with_pool(10).await;

    let err = ctx
        .ledger()
        .withdraw(&ctx.player, ctx.tokens(1))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), FailureKind::NotOwner);
    assert_eq!(ctx.holding_of(&ctx.player), TokenAmount::ZERO);
}
