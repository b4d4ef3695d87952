//! Adding items

use futures::future::BoxFuture;

use todo_common::{ListKind, Tab};

use super::{ensure, Group, Scenario, ScenarioContext};
use crate::error::E2eResult;
use crate::expect::expect;

pub(super) fn scenarios() -> Vec<Scenario> {
    let g = Group::AddItem;
    vec![
        Scenario::builtin("TC007", "Should display input field and add button", g, tc007),
        Scenario::builtin("TC008", "Input field should accept text input", g, tc008),
        Scenario::builtin("TC009", "Should add a new todo item with normal text", g, tc009),
        Scenario::builtin("TC010", "Should clear input field after adding item", g, tc010),
        Scenario::builtin("TC011", "Should add multiple items consecutively", g, tc011),
        Scenario::builtin("TC012", "Should add item with special characters", g, tc012),
        Scenario::builtin("TC013", "Should add item with Thai characters", g, tc013),
        Scenario::builtin("TC014", "Should add item with very long text", g, tc014),
        Scenario::builtin("TC015", "Should add item with numbers only", g, tc015),
        Scenario::builtin("TC016", "Should add item with emoji", g, tc016),
    ]
}

/// Add `text` from the Add Item tab and expect it in the To-Do list
async fn add_and_expect_listed(ctx: &ScenarioContext, text: &str) -> E2eResult<()> {
    let page = &ctx.page;
    page.open(Some(Tab::AddItem)).await?;
    page.add_item(text).await?;
    page.navigate(Tab::Todo).await?;
    expect(page, page.item(ListKind::Todo, text)).to_be_visible().await
}

fn tc007(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let page = &ctx.page;
        page.open(Some(Tab::AddItem)).await?;
        expect(page, page.input()).to_be_visible().await?;
        expect(page, page.add_button()).to_be_visible().await
    })
}

fn tc008(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let page = &ctx.page;
        page.open(Some(Tab::AddItem)).await?;
        page.fill_input("Test Input Text").await?;
        expect(page, page.input()).to_have_value("Test Input Text").await
    })
}

fn tc009(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move { add_and_expect_listed(ctx, &ctx.unique("Test Item")).await })
}

fn tc010(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let page = &ctx.page;
        page.open(Some(Tab::AddItem)).await?;
        page.add_item(&ctx.unique("Clear Test")).await?;
        expect(page, page.input()).to_have_value("").await
    })
}

fn tc011(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let page = &ctx.page;
        let items = ["Item A", "Item B", "Item C"].map(|p| ctx.unique(p));

        page.open(Some(Tab::AddItem)).await?;
        for item in &items {
            page.add_item(item).await?;
        }
        page.navigate(Tab::Todo).await?;
        for item in &items {
            expect(page, page.item(ListKind::Todo, item)).to_be_visible().await?;
        }
        Ok(())
    })
}

fn tc012(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move { add_and_expect_listed(ctx, &ctx.unique("Test @#$%^&*()")).await })
}

fn tc013(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move { add_and_expect_listed(ctx, &ctx.unique("รายการทดสอบภาษาไทย")).await })
}

fn tc014(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let page = &ctx.page;
        let long = ctx.unique(&"A".repeat(100));

        page.open(Some(Tab::AddItem)).await?;
        page.add_item(&long).await?;
        page.navigate(Tab::Todo).await?;

        let prefix: String = long.chars().take(50).collect();
        let matches = page.driver().count(&page.item(ListKind::Todo, &prefix)).await?;
        ensure(matches > 0, || {
            format!("no To-Do row contains the first 50 characters of a {}-character item", long.len())
        })
    })
}

fn tc015(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move { add_and_expect_listed(ctx, &ctx.unique("123456789")).await })
}

fn tc016(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move { add_and_expect_listed(ctx, &ctx.unique("🎉 Party 🎊")).await })
}
