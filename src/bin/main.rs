use multikey_rbt::MultiKeyTree;

fn main() {
    let mut tree: MultiKeyTree<u32> = MultiKeyTree::new();

    tree.insert_key(20);
    tree.assert_invariants();
    println!("{:?}", tree.iter().collect::<Vec<_>>());

    tree.insert_key(0);
    tree.assert_invariants();
    println!("{:?}", tree.iter().collect::<Vec<_>>());

    tree.insert_key(30);
    tree.assert_invariants();
    println!("{:?}", tree.iter().collect::<Vec<_>>());

    tree.insert_key(20);
    tree.assert_invariants();
    println!("{:?}", tree.iter().collect::<Vec<_>>());

    tree.insert_key(40);
    tree.assert_invariants();
    println!("{:?}", tree.iter().collect::<Vec<_>>());

    tree.insert_key(10);
    tree.assert_invariants();
    println!("{:?}", tree.iter().collect::<Vec<_>>());

    tree.insert_key(20);
    tree.assert_invariants();
    println!("{:?}", tree.iter().collect::<Vec<_>>());

    println!("{} nodes, {} keys", tree.size(), tree.num_keys());

    tree.set_iteration_start_point(Some(20));
    println!("from 20: {:?}", tree.iter().collect::<Vec<_>>());

    tree.set_iteration_start_point(None);
    println!("reset:   {:?}", tree.iter().collect::<Vec<_>>());

    drop(tree);
}
