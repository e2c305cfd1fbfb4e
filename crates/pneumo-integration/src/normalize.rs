//! 上游记录归一化
//!
//! 列表视图使用宽松规则（缺失字段填默认值，无法确定ID的记录被丢弃）；
//! 详情与预诊断使用严格规则（必填字段缺失即映射失败）。两条路径互不复用。

use pneumo_core::extract::{
    lenient_f64, lenient_id, lenient_non_empty, lenient_object, lenient_string, FieldError,
    FieldProblem, StrictReader,
};
use pneumo_core::utils::{build_image_url, normalize_date, normalize_label, UNCLASSIFIED_LABEL};
use pneumo_core::{
    Approval, Case, CaseDetail, CaseStatus, Diagnostic, MappingError, ModelResult, PreDiagnostic,
    RawRecord,
};

const CASE_ID_FIELDS: [&str; 3] = ["prediagnostico_id", "id", "_id"];
const OWNER_FIELD: &str = "user_id";
const MODEL_RESULT_FIELD: &str = "resultado_modelo";

// ========== 宽松路径（列表视图） ==========

/// 宽松归一化单条病例，无法确定ID时返回 `None`
///
/// `patient_id` 取记录中的 `user_id`（缺失为空串），调用方可用请求者身份覆盖。
pub fn lenient_case(record: &RawRecord, image_base_url: &str) -> Option<Case> {
    let id = lenient_id(record, &CASE_ID_FIELDS)?;

    let uploaded_at = normalize_date(
        lenient_string(record, "fecha")
            .or_else(|| lenient_string(record, "fecha_subida"))
            .as_deref(),
    );

    Some(Case {
        id,
        patient_id: lenient_string(record, OWNER_FIELD).unwrap_or_default(),
        patient_name: lenient_non_empty(record, "paciente_nombre"),
        patient_email: lenient_non_empty(record, "paciente_email"),
        status: CaseStatus::from_wire(lenient_string(record, "estado").as_deref()),
        image_url: build_image_url(
            image_base_url,
            lenient_string(record, "radiografia_ruta").as_deref(),
        ),
        model_result: lenient_model_result(record, &uploaded_at),
        assigned_doctor_id: lenient_id(record, &["doctor_asignado"]),
        uploaded_at,
    })
}

/// 模型结果可能嵌套在 `resultado_modelo` 中，也可能是平铺的 `probabilidad` / `diagnostico_ia`
///
/// 两者都没有时返回 `None`；处理时间缺失时沿用上传时间。
fn lenient_model_result(record: &RawRecord, uploaded_at: &str) -> Option<ModelResult> {
    let (probability, label) = match lenient_object(record, MODEL_RESULT_FIELD) {
        Some(nested) => (
            lenient_f64(nested, "probabilidad_neumonia"),
            lenient_non_empty(nested, "etiqueta"),
        ),
        None => (
            lenient_f64(record, "probabilidad"),
            lenient_non_empty(record, "diagnostico_ia"),
        ),
    };

    if probability.is_none() && label.is_none() {
        return None;
    }

    let processed_at = lenient_string(record, "fecha_procesamiento")
        .map(|date| normalize_date(Some(&date)))
        .unwrap_or_else(|| uploaded_at.to_string());

    Some(ModelResult {
        probability: probability.unwrap_or(0.0).clamp(0.0, 1.0),
        label: label
            .map(|l| normalize_label(&l))
            .unwrap_or_else(|| UNCLASSIFIED_LABEL.to_string()),
        processed_at,
    })
}

// ========== 严格路径（详情/预诊断） ==========

/// 读取病例所属用户ID
///
/// 缺失或类型错误都是映射失败，绝不当作"无主"处理。
pub fn case_owner(record: &RawRecord, context: &str) -> Result<String, MappingError> {
    let mut reader = StrictReader::new(record);
    match reader.string(OWNER_FIELD) {
        Some(owner) => Ok(owner),
        None => Err(reader.into_error(context)),
    }
}

/// 组装病例详情（不含诊断）
///
/// 病例ID严格读取且必须与请求的ID一致；其余展示字段宽松处理。
/// `owner` 必须是已通过归属校验的用户ID。
pub fn case_detail(
    record: &RawRecord,
    requested_id: &str,
    owner: &str,
    image_base_url: &str,
    context: &str,
) -> Result<CaseDetail, MappingError> {
    let mut reader = StrictReader::new(record);
    let Some(case_id) = reader.string("prediagnostico_id") else {
        return Err(reader.into_error(context));
    };
    if case_id != requested_id {
        reader.reject(
            "prediagnostico_id",
            FieldProblem::InvalidValue {
                reason: format!("expected case '{}', found '{}'", requested_id, case_id),
            },
        );
        return Err(reader.into_error(context));
    }

    let status = CaseStatus::from_wire(lenient_string(record, "estado").as_deref());
    let uploaded_at = normalize_date(
        lenient_string(record, "fecha_subida")
            .or_else(|| lenient_string(record, "fecha"))
            .as_deref(),
    );
    let image_url = build_image_url(
        image_base_url,
        lenient_string(record, "radiografia_ruta").as_deref(),
    );
    let model_result = lenient_object(record, MODEL_RESULT_FIELD).map(|nested| ModelResult {
        probability: lenient_f64(nested, "probabilidad_neumonia")
            .unwrap_or(0.0)
            .clamp(0.0, 1.0),
        label: lenient_non_empty(nested, "etiqueta")
            .map(|l| normalize_label(&l))
            .unwrap_or_else(|| UNCLASSIFIED_LABEL.to_string()),
        processed_at: normalize_date(lenient_string(record, "fecha_procesamiento").as_deref()),
    });

    let pre_diagnostic = PreDiagnostic {
        case_id: case_id.clone(),
        patient_id: owner.to_string(),
        image_path: image_url.clone(),
        status: status.clone(),
        model_result,
        uploaded_at: uploaded_at.clone(),
    };

    Ok(CaseDetail {
        id: case_id,
        image_url,
        status,
        uploaded_at,
        pre_diagnostic,
        diagnostic: None,
    })
}

/// 严格映射预诊断，任何必填字段缺失或类型错误都会失败
///
/// 字段值保持上游原样（日期与标签不做展示格式化）。
pub fn strict_pre_diagnostic(id: &str, record: &RawRecord) -> Result<PreDiagnostic, MappingError> {
    let context = format!("prediagnostic {}", id);
    let mut reader = StrictReader::new(record);

    let patient_id = reader.string(OWNER_FIELD);
    let image_path = reader.string("radiografia_ruta");
    let status = reader.string("estado");
    let nested = reader.object(MODEL_RESULT_FIELD);
    let probability =
        nested.and_then(|m| reader.nested_number(m, MODEL_RESULT_FIELD, "probabilidad_neumonia"));
    let label = nested.and_then(|m| reader.nested_string(m, MODEL_RESULT_FIELD, "etiqueta"));
    let processed_at = reader.string("fecha_procesamiento");
    let uploaded_at = reader.string("fecha_subida");

    if let Some(p) = probability {
        if !(0.0..=1.0).contains(&p) {
            reader.reject(
                format!("{}.probabilidad_neumonia", MODEL_RESULT_FIELD),
                FieldProblem::InvalidValue {
                    reason: format!("probability {} outside 0.0..=1.0", p),
                },
            );
        }
    }

    let (
        Some(patient_id),
        Some(image_path),
        Some(status),
        Some(probability),
        Some(label),
        Some(processed_at),
        Some(uploaded_at),
    ) = (
        patient_id,
        image_path,
        status,
        probability,
        label,
        processed_at,
        uploaded_at,
    )
    else {
        return Err(reader.into_error(context));
    };
    reader.finish(context)?;

    Ok(PreDiagnostic {
        case_id: id.to_string(),
        patient_id,
        image_path,
        status: CaseStatus::from_wire(Some(&status)),
        model_result: Some(ModelResult {
            probability,
            label,
            processed_at,
        }),
        uploaded_at,
    })
}

/// 映射上游诊断记录
///
/// 审核结论无法识别时失败；其余字段宽松处理。
pub fn diagnostic(record: &RawRecord, case_id: &str) -> Result<Diagnostic, MappingError> {
    let context = format!("diagnostic for case {}", case_id);
    let approval = match record.get("validacion") {
        Some(value) => Approval::from_wire(value).ok_or_else(|| {
            MappingError::new(
                context.as_str(),
                vec![FieldError::new(
                    "validacion",
                    FieldProblem::InvalidValue {
                        reason: format!("unrecognised approval value {}", value),
                    },
                )],
            )
        })?,
        None => {
            return Err(MappingError::new(
                context,
                vec![FieldError::new("validacion", FieldProblem::Missing)],
            ))
        }
    };

    Ok(Diagnostic {
        id: lenient_id(record, &["id", "_id"]).unwrap_or_default(),
        case_id: lenient_non_empty(record, "case_id").unwrap_or_else(|| case_id.to_string()),
        approval,
        comment: lenient_string(record, "diagnostico").unwrap_or_default(),
        reviewed_at: normalize_date(lenient_string(record, "fecha_validacion").as_deref()),
        doctor_name: lenient_non_empty(record, "doctor_nombre"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pneumo_core::utils::{DATE_UNAVAILABLE, PLACEHOLDER_IMAGE_URL, POSITIVE_FINDING_LABEL};
    use serde_json::{json, Value};

    const BASE: &str = "http://localhost:8000/prediagnostic/image";

    fn record(value: Value) -> RawRecord {
        match value {
            Value::Object(map) => map,
            _ => panic!("test record must be an object"),
        }
    }

    #[test]
    fn test_lenient_case_full_record() {
        let r = record(json!({
            "prediagnostico_id": "c-1",
            "user_id": "u-1",
            "paciente_nombre": "Ana",
            "fecha": "2024-03-05T14:07:00Z",
            "estado": "completed",
            "radiografia_ruta": "storage\\radiografias\\RAD-1.jpg",
            "doctor_asignado": "",
            "probabilidad": 0.91,
            "diagnostico_ia": "pneumonia"
        }));

        let case = lenient_case(&r, BASE).unwrap();
        assert_eq!(case.id, "c-1");
        assert_eq!(case.patient_id, "u-1");
        assert_eq!(case.patient_name.as_deref(), Some("Ana"));
        assert!(case.patient_email.is_none());
        assert_eq!(case.status, CaseStatus::Completed);
        assert!(case.image_url.ends_with("RAD-1.jpg"));
        assert!(case.assigned_doctor_id.is_none());

        let result = case.model_result.unwrap();
        assert_eq!(result.probability, 0.91);
        assert_eq!(result.label, POSITIVE_FINDING_LABEL);
        assert_eq!(result.processed_at, "05/03/2024 14:07");
    }

    #[test]
    fn test_lenient_case_defaults() {
        let r = record(json!({ "id": 42, "estado": null }));

        let case = lenient_case(&r, BASE).unwrap();
        assert_eq!(case.id, "42");
        assert_eq!(case.status, CaseStatus::Unknown);
        assert_eq!(case.uploaded_at, DATE_UNAVAILABLE);
        assert_eq!(case.image_url, PLACEHOLDER_IMAGE_URL);
        assert!(case.model_result.is_none());
        assert_eq!(case.patient_id, "");
    }

    #[test]
    fn test_lenient_case_missing_status_is_unknown() {
        let r = record(json!({ "prediagnostico_id": "c-2", "fecha": "garbage" }));
        let case = lenient_case(&r, BASE).unwrap();
        assert_eq!(case.status, CaseStatus::Unknown);
        assert_eq!(case.uploaded_at, DATE_UNAVAILABLE);
    }

    #[test]
    fn test_lenient_case_without_id_is_dropped() {
        let r = record(json!({ "estado": "pending", "prediagnostico_id": "" }));
        assert!(lenient_case(&r, BASE).is_none());
    }

    #[test]
    fn test_lenient_nested_model_result() {
        let r = record(json!({
            "_id": "c-3",
            "fecha_subida": "2024-01-02 08:00:00",
            "resultado_modelo": { "probabilidad_neumonia": 0.12 }
        }));

        let result = lenient_case(&r, BASE).unwrap().model_result.unwrap();
        assert_eq!(result.probability, 0.12);
        assert_eq!(result.label, UNCLASSIFIED_LABEL);
        assert_eq!(result.processed_at, "02/01/2024 08:00");
    }

    #[test]
    fn test_case_owner_requires_string() {
        assert_eq!(case_owner(&record(json!({ "user_id": "u-9" })), "case 1").unwrap(), "u-9");

        let err = case_owner(&record(json!({ "user_id": 9 })), "case 1").unwrap_err();
        assert!(err.has_field("user_id"));
        let err = case_owner(&record(json!({})), "case 1").unwrap_err();
        assert_eq!(err.fields[0].problem, FieldProblem::Missing);
    }

    #[test]
    fn test_case_detail_requires_case_id() {
        let r = record(json!({ "user_id": "u-1", "estado": "pending" }));
        let err = case_detail(&r, "7", "u-1", BASE, "case 7").unwrap_err();
        assert!(err.has_field("prediagnostico_id"));
    }

    #[test]
    fn test_case_detail_rejects_other_case_id() {
        let r = record(json!({ "prediagnostico_id": "c-9", "user_id": "u-1" }));
        let err = case_detail(&r, "c-1", "u-1", BASE, "case c-1").unwrap_err();
        assert!(err.has_field("prediagnostico_id"));
        assert!(matches!(err.fields[0].problem, FieldProblem::InvalidValue { .. }));
    }

    #[test]
    fn test_case_detail_builds_pre_diagnostic() {
        let r = record(json!({
            "prediagnostico_id": "c-5",
            "user_id": "u-1",
            "estado": "Validado",
            "fecha_subida": "2024-03-05T14:07:00Z",
            "radiografia_ruta": "/data/RAD-5.png",
            "resultado_modelo": { "probabilidad_neumonia": 0.4, "etiqueta": "normal" },
            "fecha_procesamiento": "2024-03-05T14:09:00Z"
        }));

        let detail = case_detail(&r, "c-5", "u-1", BASE, "case c-5").unwrap();
        assert_eq!(detail.id, "c-5");
        assert!(detail.status.is_validated());
        assert_eq!(detail.image_url, format!("{}/RAD-5.png", BASE));
        assert_eq!(detail.pre_diagnostic.patient_id, "u-1");
        let result = detail.pre_diagnostic.model_result.unwrap();
        assert_eq!(result.label, "Normal");
        assert_eq!(result.processed_at, "05/03/2024 14:09");
        assert!(detail.diagnostic.is_none());
    }

    #[test]
    fn test_strict_pre_diagnostic() {
        let r = record(json!({
            "user_id": "u-1",
            "radiografia_ruta": "storage\\RAD-1.jpg",
            "estado": "processing",
            "resultado_modelo": { "probabilidad_neumonia": 0.77, "etiqueta": "pneumonia" },
            "fecha_procesamiento": "2024-03-05T14:09:00Z",
            "fecha_subida": "2024-03-05T14:07:00Z"
        }));

        let pre = strict_pre_diagnostic("c-1", &r).unwrap();
        assert_eq!(pre.case_id, "c-1");
        assert_eq!(pre.image_path, "storage\\RAD-1.jpg");
        assert_eq!(pre.status, CaseStatus::Processing);
        let result = pre.model_result.unwrap();
        assert_eq!(result.label, "pneumonia");
        assert_eq!(result.processed_at, "2024-03-05T14:09:00Z");
    }

    #[test]
    fn test_strict_pre_diagnostic_reports_every_field() {
        let r = record(json!({
            "user_id": "u-1",
            "estado": 3,
            "resultado_modelo": { "etiqueta": null },
            "fecha_subida": "2024-03-05T14:07:00Z"
        }));

        let err = strict_pre_diagnostic("c-1", &r).unwrap_err();
        assert_eq!(err.context, "prediagnostic c-1");
        assert!(err.has_field("radiografia_ruta"));
        assert!(err.has_field("estado"));
        assert!(err.has_field("resultado_modelo.probabilidad_neumonia"));
        assert!(err.has_field("resultado_modelo.etiqueta"));
        assert!(err.has_field("fecha_procesamiento"));
        assert!(!err.has_field("user_id"));
        assert_eq!(err.fields.len(), 5);
    }

    #[test]
    fn test_strict_pre_diagnostic_rejects_out_of_range_probability() {
        let r = record(json!({
            "user_id": "u-1",
            "radiografia_ruta": "RAD-1.jpg",
            "estado": "completed",
            "resultado_modelo": { "probabilidad_neumonia": 1.7, "etiqueta": "pneumonia" },
            "fecha_procesamiento": "x",
            "fecha_subida": "y"
        }));

        let err = strict_pre_diagnostic("c-1", &r).unwrap_err();
        assert!(err.has_field("resultado_modelo.probabilidad_neumonia"));
    }

    #[test]
    fn test_diagnostic_mapping() {
        let r = record(json!({
            "_id": "d-1",
            "case_id": "c-1",
            "validacion": "Si",
            "diagnostico": "Consolidation in the lower lobe",
            "fecha_validacion": "2024-03-06T10:00:00Z",
            "doctor_nombre": "Dr. Ruiz"
        }));

        let diagnostic = diagnostic(&r, "c-1").unwrap();
        assert_eq!(diagnostic.id, "d-1");
        assert_eq!(diagnostic.approval, Approval::Approved);
        assert_eq!(diagnostic.reviewed_at, "06/03/2024 10:00");
        assert_eq!(diagnostic.doctor_name.as_deref(), Some("Dr. Ruiz"));

        let boolean = record(json!({ "id": "d-2", "validacion": false }));
        let diagnostic = super::diagnostic(&boolean, "c-2").unwrap();
        assert_eq!(diagnostic.approval, Approval::NotApproved);
        assert_eq!(diagnostic.case_id, "c-2");
    }

    #[test]
    fn test_diagnostic_with_unknown_approval_fails() {
        let err = diagnostic(&record(json!({ "validacion": "maybe" })), "c-1").unwrap_err();
        assert!(err.has_field("validacion"));
        let err = diagnostic(&record(json!({})), "c-1").unwrap_err();
        assert_eq!(err.fields[0].problem, FieldProblem::Missing);
    }
}
