use eyre::Result;
use vending_tests::TestCtxBuilder;

#[tokio::test] // Every test function needs to be decorated with this attribute
#[ntest::timeout(20_000)] // Test timeout in ms
async fn test_example() -> Result<()> {
    // Create a test context with 10000 kumis at 100 each
    let ctx = TestCtxBuilder::new()
        .with_stock(10_000)
        .with_price(100)
        .build()
        .await?;

    assert_eq!(ctx.api.get_price().await?.result?, 100);

    // Pay 150, expect 50 back
    assert_eq!(ctx.api.buy(150).await?.result?, 50);
    let stats = ctx.api.stats().await?.result?;
    assert_eq!(stats.stock, 9_999);
    assert_eq!(stats.revenue, 100);

    // Not enough money
    let response = ctx.api.buy(50).await?;
    assert_eq!(response.status(), 403);
    assert_eq!(
        response.message(),
        "Not enough money for kumis. Please, check the price."
    );

    // Finish the test
    ctx.finish().await
}
