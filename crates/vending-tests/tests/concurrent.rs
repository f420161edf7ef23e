use eyre::Result;
use futures::future::try_join_all;
use vending_tests::TestCtxBuilder;

#[tokio::test]
#[ntest::timeout(60_000)]
async fn test_concurrent_buyers_never_oversell() -> Result<()> {
    let ctx = TestCtxBuilder::new()
        .with_stock(100)
        .with_workers(8)
        .build()
        .await?;

    let buyers = (0..16).map(|_| {
        let api = ctx.api.clone();
        let price = ctx.price;
        tokio::spawn(async move {
            let mut sold = 0u32;
            let mut out_of_stock = 0u32;
            for _ in 0..25 {
                let response = api.buy(price + 1).await?;
                match response.status() {
                    200 => {
                        assert_eq!(response.result?, 1);
                        sold += 1;
                    }
                    400 => out_of_stock += 1,
                    status => panic!("Unexpected status {status}"),
                }
            }
            Ok::<_, eyre::Report>((sold, out_of_stock))
        })
    });

    let mut sold = 0;
    let mut out_of_stock = 0;
    for result in try_join_all(buyers).await? {
        let (s, o) = result?;
        sold += s;
        out_of_stock += o;
    }

    assert_eq!(sold, 100, "Exactly the initial stock must be sold.");
    assert_eq!(out_of_stock, 16 * 25 - 100);

    let stats = ctx.api.stats().await?.result?;
    assert_eq!(stats.stock, 0);
    assert_eq!(stats.sold, 100);
    assert_eq!(stats.revenue, 100 * ctx.price);

    ctx.finish().await
}

#[tokio::test]
#[ntest::timeout(60_000)]
async fn test_concurrent_uploads_of_one_name() -> Result<()> {
    let ctx = TestCtxBuilder::new().with_workers(4).build().await?;

    let contents: Vec<Vec<u8>> = (0..8u8).map(|i| vec![i; 64 << 10]).collect();
    let uploads = contents.iter().cloned().map(|content| {
        let api = ctx.api.clone();
        tokio::spawn(async move { api.upload("shared.bin", &content).await })
    });
    for result in try_join_all(uploads).await? {
        result?.result?;
    }

    // Last writer wins, but the file is always one complete upload
    let stored = std::fs::read(ctx.upload_dir.join("shared.bin"))?;
    assert!(contents.contains(&stored));
    assert_eq!(std::fs::read_dir(&ctx.upload_dir)?.count(), 1);

    ctx.finish().await
}
