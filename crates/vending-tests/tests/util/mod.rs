use eyre::Result;
use vending_tests::TestCtx;

/// Buys until the machine is sold out and checks that every purchase succeeded.
#[allow(unused)]
pub async fn drain(ctx: &TestCtx) -> Result<()> {
    let remaining = ctx.api.stats().await?.result?.stock;
    for i in 0..remaining {
        let response = ctx.api.buy(ctx.price).await?;
        assert_eq!(
            response.result?,
            0,
            "Purchase {i} of {remaining} with the exact price must succeed without change."
        );
    }
    assert_eq!(ctx.api.stats().await?.result?.stock, 0);
    Ok(())
}
