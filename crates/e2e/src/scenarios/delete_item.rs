//! Deleting items from either list

use futures::future::BoxFuture;

use todo_common::{ListKind, Tab};

use super::{Group, Scenario, ScenarioContext};
use crate::error::E2eResult;
use crate::expect::expect;

pub(super) fn scenarios() -> Vec<Scenario> {
    let g = Group::DeleteItem;
    vec![
        Scenario::builtin("TC022", "Should delete uncompleted item", g, tc022),
        Scenario::builtin("TC023", "Should delete completed item", g, tc023),
        Scenario::builtin("TC024", "Should delete multiple items", g, tc024),
        Scenario::builtin("TC025", "Delete button should be visible for each item", g, tc025),
        Scenario::builtin("TC026", "Should handle rapid deletion", g, tc026),
    ]
}

fn tc022(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let page = &ctx.page;
        let item = ctx.unique("Delete Uncompleted");
        page.open(Some(Tab::AddItem)).await?;
        page.add_item(&item).await?;
        page.navigate(Tab::Todo).await?;
        page.delete_item(&item, ListKind::Todo).await?;
        expect(page, page.item(ListKind::Todo, &item)).not().to_be_visible().await
    })
}

fn tc023(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let page = &ctx.page;
        let item = ctx.unique("Delete Completed");
        page.open(Some(Tab::AddItem)).await?;
        page.add_item(&item).await?;
        page.navigate(Tab::Todo).await?;
        page.complete_item(&item).await?;

        page.navigate(Tab::Completed).await?;
        page.delete_item(&item, ListKind::Completed).await?;
        expect(page, page.item(ListKind::Completed, &item)).not().to_be_visible().await
    })
}

fn tc024(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let page = &ctx.page;
        let items = ["Multi Delete A", "Multi Delete B"].map(|p| ctx.unique(p));

        page.open(Some(Tab::AddItem)).await?;
        for item in &items {
            page.add_item(item).await?;
        }
        page.navigate(Tab::Todo).await?;
        for item in &items {
            page.delete_item(item, ListKind::Todo).await?;
        }
        for item in &items {
            expect(page, page.item(ListKind::Todo, item)).not().to_be_visible().await?;
        }
        Ok(())
    })
}

fn tc025(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let page = &ctx.page;
        let item = ctx.unique("Delete Button Test");
        page.open(Some(Tab::AddItem)).await?;
        page.add_item(&item).await?;
        page.navigate(Tab::Todo).await?;
        expect(page, page.delete_button(ListKind::Todo, &item)).to_be_visible().await
    })
}

fn tc026(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let page = &ctx.page;
        let items = ["Rapid A", "Rapid B", "Rapid C"].map(|p| ctx.unique(p));

        page.open(Some(Tab::AddItem)).await?;
        for item in &items {
            page.add_item(item).await?;
        }
        page.navigate(Tab::Todo).await?;

        // Bounded so a delete button that does nothing cannot spin forever
        let buttons = page.delete_buttons(ListKind::Todo);
        let mut remaining = page.driver().count(&buttons).await?;
        let mut clicks = 0;
        while remaining > 0 && clicks < 100 {
            page.driver().click(&buttons.clone().first()).await?;
            clicks += 1;
            remaining = page.driver().count(&buttons).await?;
        }
        expect(page, buttons).to_have_count(0).await
    })
}
