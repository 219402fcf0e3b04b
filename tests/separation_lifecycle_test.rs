// ==========================================
// 分拣生命周期集成测试
// ==========================================
// 职责: 打开 / 核算 / 替代 / 保存 / 重开 / 归档 全流程
// 数据: 演示目录与工单（临时数据库文件）
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod separation_lifecycle_test {
    use material_separation::api::ApiError;
    use material_separation::domain::{ActionType, FinalizeMode, Order, RequiredItem};
    use material_separation::engine::{EnsureOutcome, ReconcileOutcome};
    use material_separation::repository::{HistoryStore, SeparationStore};

    use crate::test_helpers::{create_seeded_state, item_index, open_stores, operator};

    // ==========================================
    // 全部完成 → 归档
    // ==========================================

    #[test]
    fn test_total_finalize_archives_and_next_open_creates_new_record() {
        let (_tmp, state) = create_seeded_state().unwrap();
        let api = &state.separation_api;
        let ana = operator("ana");

        let view = api.open_checklist("op-1006", &ana).unwrap();
        assert_eq!(view.outcome, Some(EnsureOutcome::Created));
        assert_eq!(view.record.items.len(), 2);
        let first_id = view.record.separation_id.clone();

        for idx in 0..view.record.items.len() {
            let update = api.set_official_quantity("OP-1006", idx, "15", &ana).unwrap();
            assert_eq!(update.outcome, ReconcileOutcome::Applied { confirmed: true });
        }

        let saved = api.save("OP-1006").unwrap();
        assert_eq!(saved.mode, FinalizeMode::Total);
        assert!(saved.archived);
        assert!(!saved.replaced_history);
        assert_eq!(saved.pending, 0);
        assert!(saved.record.items.iter().all(|i| i.locked));
        assert!(saved.record.finished_at.is_some());

        let (separations, history, logs) = open_stores(&state.db_path).unwrap();
        assert!(separations.find_by_order("OP-1006").unwrap().is_empty());
        let archived = history.find_by_order("OP-1006").unwrap();
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].separation_id, first_id);
        assert_eq!(archived[0].finalize_mode, FinalizeMode::Total);

        let action_types: Vec<String> = logs
            .find_by_order("OP-1006")
            .unwrap()
            .into_iter()
            .map(|l| l.action_type)
            .collect();
        for expected in [
            ActionType::CreateSeparation,
            ActionType::FinalizeTotal,
            ActionType::ArchiveSeparation,
            ActionType::RemoveSeparation,
        ] {
            assert!(
                action_types.iter().any(|t| t == expected.as_str()),
                "缺少操作日志 {}",
                expected.as_str()
            );
        }

        let reopened = api.open_checklist("OP-1006", &ana).unwrap();
        assert_eq!(reopened.outcome, Some(EnsureOutcome::Created));
        assert_ne!(reopened.record.separation_id, first_id);
        assert!(reopened.record.items.iter().all(|i| !i.confirmed && !i.locked));
    }

    // ==========================================
    // 部分完成 → 重开
    // ==========================================

    #[test]
    fn test_partial_finalize_then_reopen_keeps_confirmed_items_locked() {
        let (_tmp, state) = create_seeded_state().unwrap();
        let api = &state.separation_api;
        let ana = operator("ana");

        let view = api.open_checklist("OP-1005", &ana).unwrap();
        let chapa = item_index(&view.record, "MAT-0001");
        let parafuso = item_index(&view.record, "MAT-0002");
        api.set_official_quantity("OP-1005", chapa, "5", &ana).unwrap();

        let saved = api.save("OP-1005").unwrap();
        assert_eq!(saved.mode, FinalizeMode::Partial);
        assert!(!saved.archived);
        assert_eq!(saved.pending, 1);
        assert!(saved.record.items[chapa].locked);
        assert!(!saved.record.items[parafuso].locked);

        // 部分完成后不再有进行中的记录
        assert!(api.get_checklist("OP-1005").unwrap().is_none());
        assert!(matches!(
            api.save("OP-1005"),
            Err(ApiError::NoActiveSeparation(_))
        ));

        let reopened = api.open_checklist("OP-1005", &operator("bruno")).unwrap();
        assert_eq!(reopened.outcome, Some(EnsureOutcome::Reopened));
        assert_eq!(reopened.record.separation_id, view.record.separation_id);
        assert!(reopened.record.finished_at.is_none());
        assert_eq!(reopened.record.finalize_mode, FinalizeMode::None);

        let chapa_item = &reopened.record.items[chapa];
        assert!(chapa_item.locked);
        assert!(chapa_item.confirmed);
        assert_eq!(chapa_item.confirmed_by.as_deref(), Some("ana"));
        assert!(!reopened.record.items[parafuso].locked);

        // 已锁定的物料行不可修改
        let ignored = api
            .set_official_quantity("OP-1005", chapa, "0", &operator("bruno"))
            .unwrap();
        assert_eq!(ignored.outcome, ReconcileOutcome::IgnoredLocked);
        assert_eq!(ignored.record.items[chapa].attended_official, 5);
        assert!(ignored.record.items[chapa].confirmed);

        let applied = api
            .set_official_quantity("OP-1005", parafuso, "30", &operator("bruno"))
            .unwrap();
        assert_eq!(applied.outcome, ReconcileOutcome::Applied { confirmed: true });
        assert_eq!(
            applied.record.items[parafuso].confirmed_by.as_deref(),
            Some("bruno")
        );

        let saved = api.save("OP-1005").unwrap();
        assert_eq!(saved.mode, FinalizeMode::Total);
        assert!(saved.archived);
    }

    #[test]
    fn test_reopen_preserves_substitution_and_locked_item_ignores_alternative() {
        let (_tmp, state) = create_seeded_state().unwrap();
        let api = &state.separation_api;
        let ana = operator("ana");

        let view = api.open_checklist("OP-1002", &ana).unwrap();
        let parafuso = item_index(&view.record, "MAT-0002");
        api.set_official_quantity("OP-1002", parafuso, "4", &ana).unwrap();
        api.choose_alternative("OP-1002", parafuso, "MAT-0100", "6", &ana)
            .unwrap();

        let saved = api.save("OP-1002").unwrap();
        assert_eq!(saved.mode, FinalizeMode::Partial);
        assert!(saved.record.items[parafuso].locked);

        let reopened = api.open_checklist("OP-1002", &operator("bruno")).unwrap();
        assert_eq!(reopened.outcome, Some(EnsureOutcome::Reopened));
        let item = &reopened.record.items[parafuso];
        assert!(item.locked);
        assert!(item.confirmed);
        assert_eq!(item.attended_official, 4);
        assert_eq!(item.attended_alt, 6);
        assert_eq!(item.last_alt_used.as_deref(), Some("MAT-0100"));
        let sub = item.substitution.as_ref().unwrap();
        assert_eq!(sub.to, "MAT-0100");
        assert_eq!(sub.qty, 6);
        assert_eq!(sub.operator, "ana");
        assert_eq!(reopened.record.history.len(), 1);

        // 已锁定的物料行: 替代料选择被忽略，审计日志不追加
        let ignored = api
            .choose_alternative("OP-1002", parafuso, "MAT-0101", "2", &operator("bruno"))
            .unwrap();
        assert_eq!(ignored.outcome, ReconcileOutcome::IgnoredLocked);
        let item = &ignored.record.items[parafuso];
        assert_eq!(item.attended_alt, 6);
        assert_eq!(item.last_alt_used.as_deref(), Some("MAT-0100"));
        assert_eq!(ignored.record.history.len(), 1);

        let (separations, _, _) = open_stores(&state.db_path).unwrap();
        let stored = separations.find_active("OP-1002").unwrap().unwrap();
        assert_eq!(stored.history.len(), 1);
        assert_eq!(stored.items[parafuso].attended_alt, 6);
        assert_eq!(
            stored.items[parafuso].substitution.as_ref().map(|s| s.to.as_str()),
            Some("MAT-0100")
        );
    }

    #[test]
    fn test_at_most_one_active_record_per_order() {
        let (_tmp, state) = create_seeded_state().unwrap();
        let api = &state.separation_api;
        let ana = operator("ana");

        let first = api.open_checklist("OP-1001", &ana).unwrap();
        let second = api.open_checklist("OP-1001", &ana).unwrap();
        assert_eq!(second.outcome, Some(EnsureOutcome::Existing));
        assert_eq!(first.record.separation_id, second.record.separation_id);

        let (separations, _, _) = open_stores(&state.db_path).unwrap();
        let active: Vec<_> = separations
            .find_by_order("OP-1001")
            .unwrap()
            .into_iter()
            .filter(|r| r.is_active())
            .collect();
        assert_eq!(active.len(), 1);
    }

    // ==========================================
    // 数量核算与替代料
    // ==========================================

    #[test]
    fn test_alternative_quantity_clamped_to_remaining() {
        let (_tmp, state) = create_seeded_state().unwrap();
        let api = &state.separation_api;
        let ana = operator("ana");

        let view = api.open_checklist("OP-1002", &ana).unwrap();
        let parafuso = item_index(&view.record, "MAT-0002");
        assert_eq!(view.record.items[parafuso].quantity, 10);

        api.set_official_quantity("OP-1002", parafuso, "4", &ana).unwrap();
        let update = api
            .choose_alternative("OP-1002", parafuso, "MAT-0100", "8", &ana)
            .unwrap();

        let item = &update.record.items[parafuso];
        assert_eq!(item.attended_official, 4);
        assert_eq!(item.attended_alt, 6);
        assert!(item.confirmed);
        assert_eq!(item.current_code, "MAT-0002");
        let sub = item.substitution.as_ref().unwrap();
        assert_eq!(sub.from, "MAT-0002");
        assert_eq!(sub.to, "MAT-0100");
        assert_eq!(sub.qty, 6);
        assert_eq!(update.record.substitutions().count(), 1);

        // 官方数量上限随替代料减少
        let update = api
            .set_official_quantity("OP-1002", parafuso, "10", &ana)
            .unwrap();
        assert_eq!(update.record.items[parafuso].attended_official, 4);
    }

    #[test]
    fn test_invalid_quantity_input_is_lenient() {
        let (_tmp, state) = create_seeded_state().unwrap();
        let api = &state.separation_api;
        let ana = operator("ana");

        let view = api.open_checklist("OP-1002", &ana).unwrap();
        let parafuso = item_index(&view.record, "MAT-0002");

        api.set_official_quantity("OP-1002", parafuso, "3", &ana).unwrap();
        let update = api
            .set_official_quantity("OP-1002", parafuso, "abc", &ana)
            .unwrap();
        assert_eq!(update.record.items[parafuso].attended_official, 0);

        api.choose_alternative("OP-1002", parafuso, "MAT-0101", "2", &ana)
            .unwrap();
        let update = api
            .choose_alternative("OP-1002", parafuso, "MAT-0101", "-1", &ana)
            .unwrap();
        assert_eq!(update.record.items[parafuso].attended_alt, 2);

        let update = api
            .set_official_quantity("OP-1002", parafuso, "-7", &ana)
            .unwrap();
        assert_eq!(update.record.items[parafuso].attended_official, 0);
        assert!(!update.record.items[parafuso].confirmed);
    }

    #[test]
    fn test_zero_quantity_line_counts_as_confirmed() {
        let (_tmp, state) = create_seeded_state().unwrap();
        state
            .order_repo
            .upsert(&Order {
                id: "OP-3001".to_string(),
                product_code: "PROD-ZX01".to_string(),
                product_desc: "Carroceria Modelo ZX01".to_string(),
                operation: Some("CORTE".to_string()),
                status: "ativa".to_string(),
                created_date: None,
                required_items: vec![
                    RequiredItem::new("MAT-0001", 2),
                    RequiredItem::new("MAT-0002", 0),
                ],
            })
            .unwrap();
        let api = &state.separation_api;
        let ana = operator("ana");

        let view = api.open_checklist("OP-3001", &ana).unwrap();
        let zero = &view.record.items[1];
        assert_eq!(zero.remaining(), 0);
        assert!(zero.confirmed);
        assert_eq!(view.summary.confirmed, 1);

        let saved = api.save("OP-3001").unwrap();
        assert_eq!(saved.mode, FinalizeMode::Partial);
        assert_eq!(saved.pending, 1);
        assert!(saved.record.items[1].locked);
        assert!(!saved.record.items[0].locked);
    }

    #[test]
    fn test_alternative_lookup_and_rejection() {
        let (_tmp, state) = create_seeded_state().unwrap();
        let api = &state.separation_api;
        let ana = operator("ana");

        let view = api.open_checklist("OP-1001", &ana).unwrap();
        let parafuso = item_index(&view.record, "MAT-0002");
        let porca = item_index(&view.record, "MAT-0003");

        let alts = api.list_alternatives("OP-1001", parafuso, "").unwrap();
        let codes: Vec<&str> = alts.iter().map(|c| c.code.as_str()).collect();
        assert_eq!(codes, vec!["MAT-0100", "MAT-0101"]);

        let filtered = api.list_alternatives("OP-1001", parafuso, "m8x35").unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].code, "MAT-0101");

        assert!(api.list_alternatives("OP-1001", porca, "").unwrap().is_empty());
        match api.choose_alternative("OP-1001", porca, "MAT-0100", "1", &ana) {
            Err(ApiError::AlternativeNotAllowed { base_code, alt_code }) => {
                assert_eq!(base_code, "MAT-0003");
                assert_eq!(alt_code, "MAT-0100");
            }
            other => panic!("unexpected: {:?}", other.map(|u| u.outcome)),
        }
    }

    #[test]
    fn test_item_drawing_resolved_by_current_code() {
        let (_tmp, state) = create_seeded_state().unwrap();
        let api = &state.separation_api;

        let view = api.open_checklist("OP-1002", &operator("ana")).unwrap();
        let chapa = item_index(&view.record, "MAT-0001");
        let parafuso = item_index(&view.record, "MAT-0002");

        let drawing = api.item_drawing("op-1002", parafuso).unwrap();
        assert_eq!(drawing.code, "MAT-0002");
        assert!(drawing.drawing_ref.unwrap().ends_with(".pdf"));

        let drawing = api.item_drawing("OP-1002", chapa).unwrap();
        assert_eq!(drawing.code, "MAT-0001");
        assert!(drawing.drawing_ref.is_none());

        assert!(matches!(
            api.item_drawing("OP-1002", 42),
            Err(ApiError::InvalidInput(_))
        ));
        assert!(matches!(
            api.item_drawing("OP-1004", 0),
            Err(ApiError::NoActiveSeparation(_))
        ));
    }

    // ==========================================
    // 错误路径
    // ==========================================

    #[test]
    fn test_unknown_order_creates_nothing() {
        let (_tmp, state) = create_seeded_state().unwrap();
        let api = &state.separation_api;

        assert!(matches!(
            api.open_checklist("OP-9999", &operator("ana")),
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(api.save("OP-9999"), Err(ApiError::NotFound(_))));

        let (separations, _, _) = open_stores(&state.db_path).unwrap();
        assert!(separations.find_by_order("OP-9999").unwrap().is_empty());
    }

    #[test]
    fn test_item_index_out_of_range() {
        let (_tmp, state) = create_seeded_state().unwrap();
        let api = &state.separation_api;
        let ana = operator("ana");

        api.open_checklist("OP-1006", &ana).unwrap();
        assert!(matches!(
            api.set_official_quantity("OP-1006", 9, "1", &ana),
            Err(ApiError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_discard_removes_all_records() {
        let (_tmp, state) = create_seeded_state().unwrap();
        let api = &state.separation_api;
        let ana = operator("ana");

        let view = api.open_checklist("OP-1003", &ana).unwrap();
        let chapa = item_index(&view.record, "MAT-0001");
        api.set_official_quantity("OP-1003", chapa, "3", &ana).unwrap();
        api.save("OP-1003").unwrap();

        assert_eq!(api.discard("OP-1003").unwrap(), 1);
        assert_eq!(api.discard("OP-1003").unwrap(), 0);

        let reopened = api.open_checklist("OP-1003", &ana).unwrap();
        assert_eq!(reopened.outcome, Some(EnsureOutcome::Created));
    }
}
