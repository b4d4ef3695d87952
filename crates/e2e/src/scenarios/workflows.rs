//! Persistence, edge cases, end-to-end workflows and timing

use std::time::{Duration, Instant};

use futures::future::BoxFuture;

use todo_common::{ListKind, Tab};

use super::{ensure, Group, Scenario, ScenarioContext};
use crate::error::E2eResult;
use crate::expect::expect;

const PAGE_LOAD_BUDGET: Duration = Duration::from_secs(5);
const ADD_ITEM_BUDGET: Duration = Duration::from_secs(2);
const RAPID_ADD_COUNT: usize = 10;

pub(super) fn scenarios() -> Vec<Scenario> {
    let persist = Group::DataPersistence;
    let edge = Group::EdgeCases;
    let integ = Group::Integration;
    let perf = Group::Performance;
    vec![
        Scenario::builtin("TC033", "Items should persist after page refresh", persist, tc033),
        Scenario::builtin("TC034", "Completed status should persist after refresh", persist, tc034),
        Scenario::builtin("TC035", "Should handle empty input gracefully", edge, tc035),
        Scenario::builtin("TC036", "Should handle whitespace-only input", edge, tc036),
        Scenario::builtin("TC037", "Should handle adding same item twice", edge, tc037),
        Scenario::builtin("TC038", "Should handle rapid adding of items", edge, tc038),
        Scenario::builtin("TC039", "Full workflow: Add -> Complete -> Delete", integ, tc039),
        Scenario::builtin("TC040", "Full workflow: Add -> Delete without completing", integ, tc040),
        Scenario::builtin("TC043", "Page should load within acceptable time", perf, tc043),
        Scenario::builtin("TC044", "Adding item should be responsive", perf, tc044),
    ]
}

fn tc033(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let page = &ctx.page;
        let item = ctx.unique("Persistence Test");
        page.open(Some(Tab::AddItem)).await?;
        page.add_item(&item).await?;

        page.reload().await?;
        page.navigate(Tab::Todo).await?;

        let visible = page
            .driver()
            .is_visible(&page.item(ListKind::Todo, &item))
            .await
            .unwrap_or(false);
        ctx.annotate("persistence", format!("Item persistence after refresh: {}", visible));
        Ok(())
    })
}

fn tc034(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let page = &ctx.page;
        let item = ctx.unique("Complete Persist");
        page.open(Some(Tab::AddItem)).await?;
        page.add_item(&item).await?;
        page.navigate(Tab::Todo).await?;
        page.complete_item(&item).await?;

        page.reload().await?;
        page.navigate(Tab::Completed).await?;

        let visible = page
            .driver()
            .is_visible(&page.item(ListKind::Completed, &item))
            .await
            .unwrap_or(false);
        ctx.annotate("persistence", format!("Completed status persistence: {}", visible));
        Ok(())
    })
}

/// Submit whatever `input` holds and check nothing was added
async fn submit_rejected(ctx: &ScenarioContext, input: Option<&str>) -> E2eResult<()> {
    let page = &ctx.page;
    page.open(Some(Tab::AddItem)).await?;
    let before = page.driver().count(&page.rows(ListKind::Todo)).await?;

    if let Some(text) = input {
        page.fill_input(text).await?;
    }
    page.driver().click(&page.add_button()).await?;

    expect(page, page.nav(Tab::AddItem)).to_be_visible().await?;
    expect(page, page.rows(ListKind::Todo)).to_have_count(before).await
}

fn tc035(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(submit_rejected(ctx, None))
}

fn tc036(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(submit_rejected(ctx, Some("   ")))
}

fn tc037(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let page = &ctx.page;
        let item = ctx.unique("Duplicate");
        page.open(Some(Tab::AddItem)).await?;
        page.add_item(&item).await?;
        page.add_item(&item).await?;
        page.navigate(Tab::Todo).await?;

        let count = page.driver().count(&page.item(ListKind::Todo, &item)).await?;
        ctx.annotate("duplicates", format!("Rows after adding twice: {}", count));
        ensure(count >= 1, || format!("expected at least one {:?} row, found {}", item, count))
    })
}

fn tc038(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let page = &ctx.page;
        let items: Vec<String> = (1..=RAPID_ADD_COUNT)
            .map(|i| ctx.unique(&format!("Rapid {}", i)))
            .collect();

        page.open(Some(Tab::AddItem)).await?;
        for item in &items {
            page.add_item(item).await?;
        }
        page.navigate(Tab::Todo).await?;

        expect(page, page.item(ListKind::Todo, &items[0])).to_be_visible().await?;
        for item in &items {
            expect(page, page.exact_item_text(ListKind::Todo, item))
                .to_have_count(1)
                .await?;
        }
        Ok(())
    })
}

fn tc039(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let page = &ctx.page;
        let item = ctx.unique("Full Workflow");
        page.open(Some(Tab::AddItem)).await?;
        page.add_item(&item).await?;

        page.navigate(Tab::Todo).await?;
        expect(page, page.item(ListKind::Todo, &item)).to_be_visible().await?;
        page.complete_item(&item).await?;

        page.navigate(Tab::Completed).await?;
        let done = page.item(ListKind::Completed, &item);
        expect(page, done.clone()).to_be_visible().await?;
        page.delete_item(&item, ListKind::Completed).await?;
        expect(page, done).not().to_be_visible().await
    })
}

fn tc040(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let page = &ctx.page;
        let item = ctx.unique("Add Delete Workflow");
        page.open(Some(Tab::AddItem)).await?;
        page.add_item(&item).await?;

        page.navigate(Tab::Todo).await?;
        page.delete_item(&item, ListKind::Todo).await?;
        expect(page, page.item(ListKind::Todo, &item)).not().to_be_visible().await?;

        page.navigate(Tab::Completed).await?;
        expect(page, page.item(ListKind::Completed, &item)).not().to_be_visible().await
    })
}

fn tc043(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let started = Instant::now();
        ctx.page.open(None).await?;
        let elapsed = started.elapsed();

        ctx.annotate("load-time", format!("Page load time: {}ms", elapsed.as_millis()));
        ensure(elapsed < PAGE_LOAD_BUDGET, || {
            format!("page load took {}ms, budget {}ms", elapsed.as_millis(), PAGE_LOAD_BUDGET.as_millis())
        })
    })
}

fn tc044(ctx: &ScenarioContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let page = &ctx.page;
        page.open(Some(Tab::AddItem)).await?;

        let started = Instant::now();
        page.add_item(&ctx.unique("Performance Test")).await?;
        let elapsed = started.elapsed();

        ctx.annotate("add-time", format!("Add item time: {}ms", elapsed.as_millis()));
        ensure(elapsed < ADD_ITEM_BUDGET, || {
            format!("adding an item took {}ms, budget {}ms", elapsed.as_millis(), ADD_ITEM_BUDGET.as_millis())
        })
    })
}
