//! Completing items. The checkbox disappears once ticked, so completion
//! cannot be undone from the page.

use futures::future::BoxFuture;

use todo_common::{contract, ListKind, Tab};

use super::{Group, Scenario, ScenarioContext};
use crate::error::E2eResult;
use crate::expect::expect;
use crate::locator::Selectors;

pub(super) fn scenarios() -> Vec<Scenario> {
    let g = Group::CompleteItem;
    vec![
        Scenario::builtin("TC017", "Should mark item as completed using checkbox", g, tc017),
        Scenario::builtin("TC018", "Completed item should have strikethrough style", g, tc018),
        Scenario::builtin("TC019", "Checkbox should disappear after marking complete", g, tc019),
        Scenario::builtin("TC020", "Should complete multiple items", g, tc020),
        Scenario::builtin("TC021", "Completed item should show in correct order", g, tc021),
    ]
}

/// Add `text`, then tick it from the To-Do tab
async fn add_and_complete(ctx: &ScenarioContext, text: &str) -> E2eResult<()> {
    let page = &ctx.page;
    page.open(Some(Tab::AddItem)).await?;
    page.add_item(text).await?;
    page.navigate(Tab::Todo).await?;
    page.complete_item(text).await
}

fn tc017(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let page = &ctx.page;
        let item = ctx.unique("Complete Test");
        add_and_complete(ctx, &item).await?;
        page.navigate(Tab::Completed).await?;
        expect(page, page.item(ListKind::Completed, &item)).to_be_visible().await
    })
}

fn tc018(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let page = &ctx.page;
        let item = ctx.unique("Strikethrough Test");
        add_and_complete(ctx, &item).await?;
        page.navigate(Tab::Completed).await?;

        let span = page.item(ListKind::Completed, &item).locator("span");
        expect(page, span.clone()).to_be_visible().await?;
        expect(page, span)
            .to_have_css("text-decoration", contract::COMPLETED_TEXT_DECORATION)
            .await
    })
}

fn tc019(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let page = &ctx.page;
        let item = ctx.unique("Checkbox Disappear");
        page.open(Some(Tab::AddItem)).await?;
        page.add_item(&item).await?;
        page.navigate(Tab::Todo).await?;

        let row = page.item(ListKind::Todo, &item);
        let checkbox = row.clone().locator(Selectors::checkbox());
        expect(page, checkbox.clone()).to_be_visible().await?;
        page.driver().click(&checkbox).await?;
        expect(page, row).not().to_be_visible().await
    })
}

fn tc020(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let page = &ctx.page;
        let items = ["Multi Complete A", "Multi Complete B"].map(|p| ctx.unique(p));

        page.open(Some(Tab::AddItem)).await?;
        for item in &items {
            page.add_item(item).await?;
        }
        page.navigate(Tab::Todo).await?;
        for item in &items {
            page.complete_item(item).await?;
        }
        page.navigate(Tab::Completed).await?;
        for item in &items {
            expect(page, page.item(ListKind::Completed, item)).to_be_visible().await?;
        }
        Ok(())
    })
}

fn tc021(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let page = &ctx.page;
        let first = ctx.unique("First");
        let second = ctx.unique("Second");

        page.open(Some(Tab::AddItem)).await?;
        page.add_item(&first).await?;
        page.add_item(&second).await?;
        page.navigate(Tab::Todo).await?;
        page.complete_item(&first).await?;

        page.navigate(Tab::Completed).await?;
        expect(page, page.completed_span(1)).to_contain_text(first).await
    })
}
